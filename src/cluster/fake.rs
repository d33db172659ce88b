//! In-memory cluster used by unit tests

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus as K8sDeploymentStatus};
use k8s_openapi::api::core::v1::{Namespace, Secret, Service, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::ErrorResponse;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use super::ClusterClient;

type Key = (String, String);

/// Scripted answers for repeated reads; the last answer repeats forever
struct Script<T>(VecDeque<Result<T, u16>>);

impl<T: Clone> Script<T> {
    fn next(&mut self) -> Result<T, u16> {
        if self.0.len() > 1 {
            self.0.pop_front().unwrap_or(Err(404))
        } else {
            self.0.front().cloned().unwrap_or(Err(404))
        }
    }
}

#[derive(Default)]
struct State {
    namespaces: BTreeMap<String, Namespace>,
    deployments: BTreeMap<Key, Script<Deployment>>,
    services: BTreeMap<Key, Script<Service>>,
    secrets: BTreeMap<Key, Secret>,
    failures: BTreeMap<&'static str, u16>,
    calls: Vec<String>,
}

#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<State>,
}

pub fn api_error(code: u16) -> kube::Error {
    let reason = match code {
        404 => "NotFound",
        409 => "AlreadyExists",
        _ => "InternalError",
    };
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("fake cluster answered {}", code),
        reason: reason.to_string(),
        code,
    })
}

pub fn deployment(desired: i32, ready: i32) -> Deployment {
    Deployment {
        status: Some(K8sDeploymentStatus {
            replicas: Some(desired),
            ready_replicas: Some(ready),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn service(cluster_ip: &str) -> Service {
    Service {
        spec: Some(ServiceSpec {
            cluster_ip: Some(cluster_ip.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn add_namespace(&self, name: &str) {
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        self.state().namespaces.insert(name.to_string(), ns);
    }

    pub fn has_namespace(&self, name: &str) -> bool {
        self.state().namespaces.contains_key(name)
    }

    /// Answers for successive deployment reads; `Err(code)` answers with an API error
    pub fn script_deployment(&self, namespace: &str, name: &str, answers: Vec<Result<Deployment, u16>>) {
        self.state()
            .deployments
            .insert(key(namespace, name), Script(answers.into()));
    }

    pub fn script_service(&self, namespace: &str, name: &str, answers: Vec<Result<Service, u16>>) {
        self.state()
            .services
            .insert(key(namespace, name), Script(answers.into()));
    }

    pub fn insert_secret(&self, namespace: &str, secret: Secret) {
        let name = secret.metadata.name.clone().unwrap_or_default();
        self.state().secrets.insert(key(namespace, &name), secret);
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.state().secrets.get(&key(namespace, name)).cloned()
    }

    /// Make every call of `operation` fail with `code`
    pub fn fail(&self, operation: &'static str, code: u16) {
        self.state().failures.insert(operation, code);
    }

    pub fn recover(&self, operation: &'static str) {
        self.state().failures.remove(operation);
    }

    /// Names of the operations called so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn count_calls(&self, operation: &str) -> usize {
        self.state().calls.iter().filter(|c| *c == operation).count()
    }

    fn record(&self, operation: &'static str) -> Result<(), kube::Error> {
        let mut state = self.state();
        state.calls.push(operation.to_string());
        match state.failures.get(operation) {
            Some(code) => Err(api_error(*code)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get_namespace(&self, name: &str) -> Result<Namespace, kube::Error> {
        self.record("get_namespace")?;
        self.state()
            .namespaces
            .get(name)
            .cloned()
            .ok_or_else(|| api_error(404))
    }

    async fn create_namespace(&self, namespace: &Namespace) -> Result<Namespace, kube::Error> {
        self.record("create_namespace")?;
        let name = namespace.metadata.name.clone().unwrap_or_default();
        let mut state = self.state();
        if state.namespaces.contains_key(&name) {
            return Err(api_error(409));
        }
        state.namespaces.insert(name, namespace.clone());
        Ok(namespace.clone())
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, kube::Error> {
        self.record("get_deployment")?;
        match self.state().deployments.get_mut(&key(namespace, name)) {
            Some(script) => script.next().map_err(api_error),
            None => Err(api_error(404)),
        }
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service, kube::Error> {
        self.record("get_service")?;
        match self.state().services.get_mut(&key(namespace, name)) {
            Some(script) => script.next().map_err(api_error),
            None => Err(api_error(404)),
        }
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, kube::Error> {
        self.record("get_secret")?;
        self.state()
            .secrets
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| api_error(404))
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, kube::Error> {
        self.record("create_secret")?;
        let name = secret.metadata.name.clone().unwrap_or_default();
        let mut state = self.state();
        let k = key(namespace, &name);
        if state.secrets.contains_key(&k) {
            return Err(api_error(409));
        }
        state.secrets.insert(k, secret.clone());
        Ok(secret.clone())
    }

    async fn replace_secret(
        &self,
        namespace: &str,
        name: &str,
        secret: &Secret,
    ) -> Result<Secret, kube::Error> {
        self.record("replace_secret")?;
        let mut state = self.state();
        let k = key(namespace, name);
        if !state.secrets.contains_key(&k) {
            return Err(api_error(404));
        }
        state.secrets.insert(k, secret.clone());
        Ok(secret.clone())
    }
}

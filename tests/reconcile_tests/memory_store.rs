//! In-memory object store and watch registration for scenario tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, NamespaceStatus};
use kube::{Resource, ResourceExt};

use toolchain_operator::conditions::find_condition;
use toolchain_operator::controller::{Context, ReconcileSettings, Stores};
use toolchain_operator::crd::{
    CheCluster, CheInstallation, Condition, InstallationStatus, OperatorGroup, Subscription,
    TektonInstallation, CONDITION_READY,
};
use toolchain_operator::store::{ObjectKey, ResourceStore, StatusStore};
use toolchain_operator::watch::WatchRegistration;
use toolchain_operator::Error;

/// Objects of one kind keyed by identity, with write counters
pub struct MemoryStore<K> {
    objects: Mutex<HashMap<ObjectKey, K>>,
    creates: AtomicUsize,
    status_writes: AtomicUsize,
    on_create: Option<fn(&mut K)>,
}

impl<K> MemoryStore<K>
where
    K: Resource + Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            creates: AtomicUsize::new(0),
            status_writes: AtomicUsize::new(0),
            on_create: None,
        }
    }

    /// Store that lets `hook` stand in for server-side defaulting on create
    pub fn with_create_hook(hook: fn(&mut K)) -> Self {
        Self {
            on_create: Some(hook),
            ..Self::new()
        }
    }

    /// Put an object in place without counting it as a create
    pub fn insert(&self, mut object: K) {
        if object.meta().uid.is_none() {
            object.meta_mut().uid = Some(format!("uid-{}", object.name_any()));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(ObjectKey::of(&object), object);
    }

    pub fn fetch(&self, key: &ObjectKey) -> Option<K> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn modify(&self, key: &ObjectKey, f: impl FnOnce(&mut K)) {
        let mut objects = self.objects.lock().unwrap();
        f(objects.get_mut(key).expect("object to modify"));
    }

    /// Delete an object, as a user or garbage collection would
    pub fn remove(&self, key: &ObjectKey) -> Option<K> {
        self.objects.lock().unwrap().remove(key)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }
}

fn matches_selector(labels: &std::collections::BTreeMap<String, String>, selector: &str) -> bool {
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((k, v)) => labels.get(k).map(String::as_str) == Some(v),
            None => labels.contains_key(term),
        })
}

#[async_trait]
impl<K> ResourceStore<K> for MemoryStore<K>
where
    K: Resource + Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, Error> {
        Ok(self.fetch(key))
    }

    async fn list(&self, namespace: &str, label_selector: &str) -> Result<Vec<K>, Error> {
        let objects = self.objects.lock().unwrap();
        let mut found: Vec<K> = objects
            .values()
            .filter(|o| o.namespace().as_deref() == Some(namespace))
            .filter(|o| matches_selector(o.labels(), label_selector))
            .cloned()
            .collect();
        found.sort_by_key(|o| o.name_any());
        Ok(found)
    }

    async fn create(&self, object: &K) -> Result<(), Error> {
        let key = ObjectKey::of(object);
        if self.fetch(&key).is_some() {
            return Err(Error::already_exists("object", key.name));
        }
        let mut object = object.clone();
        if let Some(hook) = self.on_create {
            hook(&mut object);
        }
        self.insert(object);
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Installation kinds whose status the store can replace
pub trait InstallationStatusField {
    fn set_status(&mut self, status: InstallationStatus);
}

impl InstallationStatusField for CheInstallation {
    fn set_status(&mut self, status: InstallationStatus) {
        self.status = Some(status);
    }
}

impl InstallationStatusField for TektonInstallation {
    fn set_status(&mut self, status: InstallationStatus) {
        self.status = Some(status);
    }
}

#[async_trait]
impl<K> StatusStore<K> for MemoryStore<K>
where
    K: InstallationStatusField + Resource + Clone + Send + Sync + 'static,
{
    async fn patch_status(&self, name: &str, status: &InstallationStatus) -> Result<(), Error> {
        let mut objects = self.objects.lock().unwrap();
        let object = objects
            .get_mut(&ObjectKey::cluster(name))
            .ok_or_else(|| Error::internal(format!("{} not found", name)))?;
        object.set_status(status.clone());
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Stand-in for the API server marking a new namespace Active
pub fn activate_namespace(ns: &mut Namespace) {
    ns.status = Some(NamespaceStatus {
        phase: Some("Active".to_string()),
        ..Default::default()
    });
}

/// Watch registration whose kind can be switched on
pub struct FakeWatch {
    served: AtomicBool,
    calls: AtomicUsize,
}

impl FakeWatch {
    pub fn served() -> Arc<Self> {
        Arc::new(Self {
            served: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn not_served() -> Arc<Self> {
        Arc::new(Self {
            served: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn serve(&self) {
        self.served.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WatchRegistration for FakeWatch {
    async fn register(&self) -> Result<(), Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.served.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::no_kind_match("org.eclipse.che", "CheCluster"))
        }
    }
}

/// One in-memory store per kind
pub struct Cluster {
    pub namespaces: Arc<MemoryStore<Namespace>>,
    pub operator_groups: Arc<MemoryStore<OperatorGroup>>,
    pub subscriptions: Arc<MemoryStore<Subscription>>,
    pub che_clusters: Arc<MemoryStore<CheCluster>>,
    pub che_installations: Arc<MemoryStore<CheInstallation>>,
    pub tekton_installations: Arc<MemoryStore<TektonInstallation>>,
}

impl Cluster {
    pub fn new() -> Self {
        Self {
            namespaces: Arc::new(MemoryStore::with_create_hook(activate_namespace)),
            operator_groups: Arc::new(MemoryStore::new()),
            subscriptions: Arc::new(MemoryStore::new()),
            che_clusters: Arc::new(MemoryStore::new()),
            che_installations: Arc::new(MemoryStore::new()),
            tekton_installations: Arc::new(MemoryStore::new()),
        }
    }

    pub fn context(&self, watch: Arc<FakeWatch>) -> Context {
        self.context_with(watch, ReconcileSettings::default())
    }

    pub fn context_with(&self, watch: Arc<FakeWatch>, settings: ReconcileSettings) -> Context {
        let stores = Stores {
            namespaces: self.namespaces.clone(),
            operator_groups: self.operator_groups.clone(),
            subscriptions: self.subscriptions.clone(),
            che_clusters: self.che_clusters.clone(),
            che_installations: self.che_installations.clone(),
            tekton_installations: self.tekton_installations.clone(),
        };
        Context::new(stores, watch, settings)
    }

    /// Dependents created across all kinds
    pub fn total_creates(&self) -> usize {
        self.namespaces.creates()
            + self.operator_groups.creates()
            + self.subscriptions.creates()
            + self.che_clusters.creates()
    }
}

pub fn ready_condition(status: Option<&InstallationStatus>) -> Option<Condition> {
    find_condition(&status?.conditions, CONDITION_READY).cloned()
}

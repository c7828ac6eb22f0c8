//! CheInstallation scenarios

use k8s_openapi::api::core::v1::{Namespace, NamespaceStatus};
use kube::api::ObjectMeta;
use kube::runtime::controller::Action;
use kube::ResourceExt;

use toolchain_operator::controller::che::reconcile_installation;
use toolchain_operator::controller::ReconcileSettings;
use toolchain_operator::crd::{
    reason, CheClusterStatus, CheInstallation, CheInstallationSpec, CheOperatorSpec,
    ConditionStatus,
};
use toolchain_operator::manifests::che::{CHE_CLUSTER_NAME, CHE_PACKAGE};
use toolchain_operator::manifests::OwnerReferencePolicy;
use toolchain_operator::store::ObjectKey;
use toolchain_operator::{Error, INSTALLATION_LABEL};

use super::memory_store::{ready_condition, Cluster, FakeWatch};

const NAME: &str = "che-installation";

fn installation(namespace: &str) -> CheInstallation {
    CheInstallation::new(
        NAME,
        CheInstallationSpec {
            che_operator_spec: CheOperatorSpec {
                namespace: namespace.to_string(),
            },
        },
    )
}

fn ready(cluster: &Cluster) -> Option<toolchain_operator::crd::Condition> {
    let inst = cluster
        .che_installations
        .fetch(&ObjectKey::cluster(NAME))
        .expect("installation");
    ready_condition(inst.status.as_ref())
}

fn che_cluster_key() -> ObjectKey {
    ObjectKey::namespaced("ns1", CHE_CLUSTER_NAME)
}

#[tokio::test]
async fn story_empty_cluster_converges_one_dependent_per_pass() {
    let cluster = Cluster::new();
    cluster.che_installations.insert(installation("ns1"));
    let watch = FakeWatch::served();
    let ctx = cluster.context(watch.clone());
    let settings = ReconcileSettings::default();

    // Pass 1: namespace
    let action = reconcile_installation(NAME, &ctx).await.unwrap();
    assert_eq!(action, Action::requeue(settings.created_requeue));
    let ns = cluster.namespaces.fetch(&ObjectKey::cluster("ns1")).unwrap();
    assert_eq!(ns.owner_references()[0].name, NAME);
    assert_eq!(cluster.total_creates(), 1);
    assert!(ready(&cluster).is_none());

    // Pass 2: operator group, now that the namespace is Active
    reconcile_installation(NAME, &ctx).await.unwrap();
    assert_eq!(cluster.operator_groups.creates(), 1);
    assert_eq!(cluster.total_creates(), 2);

    // Pass 3: subscription
    reconcile_installation(NAME, &ctx).await.unwrap();
    assert!(cluster
        .subscriptions
        .fetch(&ObjectKey::namespaced("ns1", CHE_PACKAGE))
        .is_some());
    assert_eq!(cluster.total_creates(), 3);
    assert_eq!(watch.calls(), 0);

    // Pass 4: watch registered, CheCluster created
    let action = reconcile_installation(NAME, &ctx).await.unwrap();
    assert_eq!(action, Action::requeue(settings.created_requeue));
    assert_eq!(watch.calls(), 1);
    let che = cluster.che_clusters.fetch(&che_cluster_key()).unwrap();
    assert_eq!(che.labels().get(INSTALLATION_LABEL).unwrap(), NAME);
    assert_eq!(cluster.total_creates(), 4);
    assert!(ready(&cluster).is_none());

    // Pass 5: nothing provisioned yet
    let action = reconcile_installation(NAME, &ctx).await.unwrap();
    assert_eq!(action, Action::requeue(settings.status_poll_interval));
    let condition = ready(&cluster).unwrap();
    assert_eq!(condition.status, ConditionStatus::False);
    assert_eq!(condition.reason, reason::INSTALLING);
    assert_eq!(
        condition.message,
        "Provisioning Database for CheCluster 'che'"
    );
    assert_eq!(cluster.total_creates(), 4);
    assert_eq!(watch.calls(), 1);

    // Pass 6: CheCluster reports Available
    cluster.che_clusters.modify(&che_cluster_key(), |che| {
        che.status = Some(CheClusterStatus {
            db_provisioned: true,
            keycloak_provisioned: true,
            open_shift_oauth_provisioned: true,
            devfile_registry_url: "https://devfile-registry".to_string(),
            plugin_registry_url: "https://plugin-registry".to_string(),
            che_url: "https://che".to_string(),
            che_cluster_running: "Available".to_string(),
        });
    });
    let action = reconcile_installation(NAME, &ctx).await.unwrap();
    assert_eq!(action, Action::await_change());
    let condition = ready(&cluster).unwrap();
    assert_eq!(condition.status, ConditionStatus::True);
    assert_eq!(condition.reason, reason::INSTALLED);
    assert_eq!(cluster.che_installations.status_writes(), 2);

    // Replayed pass: nothing created, nothing written
    reconcile_installation(NAME, &ctx).await.unwrap();
    assert_eq!(cluster.total_creates(), 4);
    assert_eq!(cluster.che_installations.status_writes(), 2);
}

#[tokio::test]
async fn story_partial_provisioning_reports_first_pending_component() {
    let cluster = Cluster::new();
    cluster.che_installations.insert(installation("ns1"));
    let ctx = cluster.context(FakeWatch::served());
    for _ in 0..4 {
        reconcile_installation(NAME, &ctx).await.unwrap();
    }

    cluster.che_clusters.modify(&che_cluster_key(), |che| {
        che.status = Some(CheClusterStatus {
            db_provisioned: true,
            keycloak_provisioned: true,
            open_shift_oauth_provisioned: true,
            devfile_registry_url: "https://devfile-registry".to_string(),
            ..Default::default()
        });
    });
    reconcile_installation(NAME, &ctx).await.unwrap();
    assert_eq!(
        ready(&cluster).unwrap().message,
        "Provisioning PluginRegistry for CheCluster 'che'"
    );

    cluster.che_clusters.modify(&che_cluster_key(), |che| {
        let status = che.status.as_mut().unwrap();
        status.plugin_registry_url = "https://plugin-registry".to_string();
        status.che_url = "https://che".to_string();
        status.che_cluster_running = "Unavailable".to_string();
    });
    reconcile_installation(NAME, &ctx).await.unwrap();
    assert_eq!(
        ready(&cluster).unwrap().message,
        "CheCluster running status is 'Unavailable' for CheCluster 'che'"
    );
}

#[tokio::test]
async fn story_terminating_namespace_fails_installation() {
    let cluster = Cluster::new();
    cluster.che_installations.insert(installation("ns1"));
    cluster.namespaces.insert(Namespace {
        metadata: ObjectMeta {
            name: Some("ns1".to_string()),
            ..Default::default()
        },
        status: Some(NamespaceStatus {
            phase: Some("Terminating".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    });
    let ctx = cluster.context(FakeWatch::served());

    let err = reconcile_installation(NAME, &ctx).await.unwrap_err();
    assert!(matches!(err.root(), Error::NamespaceNotActive { .. }));

    let condition = ready(&cluster).unwrap();
    assert_eq!(condition.status, ConditionStatus::False);
    assert_eq!(condition.reason, reason::FAILED_TO_INSTALL);
    assert!(condition
        .message
        .contains("namespace ns1 is not in active state"));
    assert_eq!(cluster.total_creates(), 0);

    // The same failure again does not rewrite the status
    reconcile_installation(NAME, &ctx).await.unwrap_err();
    assert_eq!(cluster.che_installations.status_writes(), 1);
}

#[tokio::test]
async fn story_absent_installation_is_a_quiet_no_op() {
    let cluster = Cluster::new();
    let ctx = cluster.context(FakeWatch::served());

    let action = reconcile_installation(NAME, &ctx).await.unwrap();

    assert_eq!(action, Action::await_change());
    assert_eq!(cluster.total_creates(), 0);
    assert_eq!(cluster.che_installations.status_writes(), 0);
    assert_eq!(cluster.che_installations.len(), 0);
}

#[tokio::test]
async fn story_checluster_kind_not_served_yet() {
    let cluster = Cluster::new();
    cluster.che_installations.insert(installation("ns1"));
    let watch = FakeWatch::not_served();
    let ctx = cluster.context(watch.clone());
    let settings = ReconcileSettings::default();

    for _ in 0..3 {
        reconcile_installation(NAME, &ctx).await.unwrap();
    }

    // OLM has not registered CheCluster yet: poll, no failure recorded
    for attempt in 1..=2 {
        let action = reconcile_installation(NAME, &ctx).await.unwrap();
        assert_eq!(action, Action::requeue(settings.kind_poll_interval));
        assert_eq!(watch.calls(), attempt);
    }
    assert!(ready(&cluster).is_none());
    assert_eq!(cluster.che_clusters.creates(), 0);

    watch.serve();
    let action = reconcile_installation(NAME, &ctx).await.unwrap();
    assert_eq!(action, Action::requeue(settings.created_requeue));
    assert_eq!(cluster.che_clusters.creates(), 1);

    // Registered once; later passes do not register again
    reconcile_installation(NAME, &ctx).await.unwrap();
    assert_eq!(watch.calls(), 3);
}

#[tokio::test]
async fn story_dependents_left_unowned_when_disabled() {
    let cluster = Cluster::new();
    cluster.che_installations.insert(installation("ns1"));
    let settings = ReconcileSettings {
        owner_references: OwnerReferencePolicy::None,
        ..Default::default()
    };
    let ctx = cluster.context_with(FakeWatch::served(), settings);

    reconcile_installation(NAME, &ctx).await.unwrap();

    let ns = cluster.namespaces.fetch(&ObjectKey::cluster("ns1")).unwrap();
    assert!(ns.owner_references().is_empty());
}

#[tokio::test]
async fn story_existing_dependents_are_not_recreated() {
    let cluster = Cluster::new();
    let inst = installation("ns1");
    cluster.che_installations.insert(inst.clone());
    let ctx = cluster.context(FakeWatch::served());
    for _ in 0..4 {
        reconcile_installation(NAME, &ctx).await.unwrap();
    }
    assert_eq!(cluster.total_creates(), 4);

    // A restarted operator starts from a fresh context
    let restarted = cluster.context(FakeWatch::served());
    reconcile_installation(NAME, &restarted).await.unwrap();
    reconcile_installation(NAME, &restarted).await.unwrap();

    assert_eq!(cluster.total_creates(), 4);
    assert_eq!(cluster.operator_groups.len(), 1);
    assert_eq!(inst.target_namespace(), "ns1");
}

//! TektonInstallation scenarios

use kube::runtime::controller::Action;
use kube::runtime::reflector::ObjectRef;
use kube::ResourceExt;

use toolchain_operator::controller::tekton::reconcile_installation;
use toolchain_operator::controller::ReconcileSettings;
use toolchain_operator::crd::{reason, ConditionStatus, TektonInstallation, TektonInstallationSpec};
use toolchain_operator::manifests::tekton::{TEKTON_NAMESPACE, TEKTON_SUBSCRIPTION_NAME};
use toolchain_operator::store::ObjectKey;
use toolchain_operator::watch::installation_for;

use super::memory_store::{ready_condition, Cluster, FakeWatch};

const NAME: &str = "tekton-installation";

fn subscription_key() -> ObjectKey {
    ObjectKey::namespaced(TEKTON_NAMESPACE, TEKTON_SUBSCRIPTION_NAME)
}

#[tokio::test]
async fn story_subscription_then_installed() {
    let cluster = Cluster::new();
    cluster
        .tekton_installations
        .insert(TektonInstallation::new(NAME, TektonInstallationSpec {}));
    let ctx = cluster.context(FakeWatch::served());

    let action = reconcile_installation(NAME, &ctx).await.unwrap();
    assert_eq!(
        action,
        Action::requeue(ReconcileSettings::default().created_requeue)
    );
    let sub = cluster.subscriptions.fetch(&subscription_key()).unwrap();
    assert_eq!(sub.owner_references()[0].name, NAME);
    assert_eq!(cluster.tekton_installations.status_writes(), 0);

    let action = reconcile_installation(NAME, &ctx).await.unwrap();
    assert_eq!(action, Action::await_change());
    let inst = cluster
        .tekton_installations
        .fetch(&ObjectKey::cluster(NAME))
        .unwrap();
    let ready = ready_condition(inst.status.as_ref()).unwrap();
    assert_eq!(ready.status, ConditionStatus::True);
    assert_eq!(ready.reason, reason::INSTALLED);

    reconcile_installation(NAME, &ctx).await.unwrap();
    assert_eq!(cluster.subscriptions.creates(), 1);
    assert_eq!(cluster.tekton_installations.status_writes(), 1);
}

#[tokio::test]
async fn story_preexisting_subscription_is_adopted_as_is() {
    let cluster = Cluster::new();
    cluster
        .tekton_installations
        .insert(TektonInstallation::new(NAME, TektonInstallationSpec {}));
    let inst = cluster
        .tekton_installations
        .fetch(&ObjectKey::cluster(NAME))
        .unwrap();
    cluster.subscriptions.insert(
        toolchain_operator::manifests::tekton::subscription(
            &inst,
            toolchain_operator::manifests::OwnerReferencePolicy::None,
        ),
    );
    let ctx = cluster.context(FakeWatch::served());

    let action = reconcile_installation(NAME, &ctx).await.unwrap();

    assert_eq!(action, Action::await_change());
    assert_eq!(cluster.subscriptions.creates(), 0);
    assert_eq!(cluster.subscriptions.len(), 1);
}

#[tokio::test]
async fn story_absent_tekton_installation_is_a_quiet_no_op() {
    let cluster = Cluster::new();
    let ctx = cluster.context(FakeWatch::served());

    let action = reconcile_installation(NAME, &ctx).await.unwrap();

    assert_eq!(action, Action::await_change());
    assert_eq!(cluster.total_creates(), 0);
}

#[tokio::test]
async fn story_deleted_subscription_triggers_its_installation_and_is_recreated() {
    let cluster = Cluster::new();
    cluster
        .tekton_installations
        .insert(TektonInstallation::new(NAME, TektonInstallationSpec {}));
    let ctx = cluster.context(FakeWatch::served());
    reconcile_installation(NAME, &ctx).await.unwrap();
    let action = reconcile_installation(NAME, &ctx).await.unwrap();
    assert_eq!(action, Action::await_change());

    // The delete event of the Subscription names the installation to wake up
    let deleted = cluster.subscriptions.remove(&subscription_key()).unwrap();
    let trigger: ObjectRef<TektonInstallation> = installation_for(&deleted).unwrap();
    assert_eq!(trigger.name, NAME);

    let action = reconcile_installation(&trigger.name, &ctx).await.unwrap();
    assert_eq!(
        action,
        Action::requeue(ReconcileSettings::default().created_requeue)
    );
    assert_eq!(cluster.subscriptions.creates(), 2);
    assert!(cluster.subscriptions.fetch(&subscription_key()).is_some());
}

use std::{io, sync::Arc, time::Duration};

use ndarray::{ArrayD, IxDyn};
use tokio::io as tokio_io;
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::time::timeout;

use comms::msg::{Command, Msg};
use comms::specs::{RejectKind, Rejection, SubmitSpec};
use comms::{WireReceiver, WireSender};
use model::{ActFnSpec, ContributionId, LayerSpec, ModelDefinition, ParameterSet};

use coordinator::registry::ProjectRegistry;
use coordinator::service::SubmissionService;
use coordinator::store::{ContributionStore, ProjectMeta};

const BUF_SIZE: usize = 64 * 1024;
const TOKEN: &str = "secret";

type ClientRx = WireReceiver<ReadHalf<DuplexStream>>;
type ClientTx = WireSender<WriteHalf<DuplexStream>>;

fn tiny_def() -> ModelDefinition {
    ModelDefinition {
        name: "tiny".into(),
        input_shape: vec![2],
        layers: vec![LayerSpec::Dense {
            units: 1,
            act_fn: ActFnSpec::Sigmoid,
        }],
    }
}

/// A conforming parameter set with every element set to `v`.
fn uniform_params(v: f32) -> ParameterSet {
    ParameterSet::new(vec![
        ArrayD::from_elem(IxDyn(&[2, 1]), v),
        ArrayD::from_elem(IxDyn(&[1]), v),
    ])
}

fn service_with_projects(projects: &[&str]) -> (tempfile::TempDir, SubmissionService) {
    let dir = tempfile::tempdir().unwrap();
    let store = ContributionStore::new(dir.path());

    for project in projects {
        store
            .create_project(
                project,
                &tiny_def(),
                &ProjectMeta {
                    tokens: vec![TOKEN.to_string()],
                },
            )
            .unwrap();
    }

    let registry = Arc::new(ProjectRegistry::new(store));
    (dir, SubmissionService::new(registry))
}

/// Connects one in-memory client to the service, leaving the service's end
/// running in a background task.
fn connect(service: &SubmissionService) -> (ClientRx, ClientTx) {
    let (sv_stream, cl_stream) = tokio_io::duplex(BUF_SIZE);

    let (sv_rx, sv_tx) = tokio_io::split(sv_stream);
    let (sv_rx, sv_tx) = comms::channel(sv_rx, sv_tx);

    let service = service.clone();
    tokio::spawn(async move { service.serve(sv_rx, sv_tx).await });

    let (cl_rx, cl_tx) = tokio_io::split(cl_stream);
    comms::channel(cl_rx, cl_tx)
}

async fn submit(
    rx: &mut ClientRx,
    tx: &mut ClientTx,
    token: &str,
    project: &str,
    id: &str,
    payload: &[u8],
) -> io::Result<Result<String, Rejection>> {
    let spec = SubmitSpec {
        token: token.to_string(),
        project: project.to_string(),
        id: id.to_string(),
    };

    tx.send(&Msg::Control(Command::Submit(spec))).await?;
    tx.send(&Msg::Contribution(payload)).await?;

    let reply: Msg = rx.recv().await?;
    match reply {
        Msg::Control(Command::Accepted { id }) => Ok(Ok(id)),
        Msg::Err(rejection) => Ok(Err(rejection)),
        other => panic!("unexpected reply: {other:?}"),
    }
}

async fn submit_params(
    rx: &mut ClientRx,
    tx: &mut ClientTx,
    project: &str,
    params: &ParameterSet,
) -> io::Result<Result<String, Rejection>> {
    let payload = params.encode();
    let id = ContributionId::digest(&payload).to_string();
    submit(rx, tx, TOKEN, project, &id, &payload).await
}

fn canonical_of(service: &SubmissionService, project: &str) -> Option<ParameterSet> {
    service.registry().store().load_canonical(project).unwrap()
}

#[tokio::test]
async fn first_contribution_bootstraps_the_canonical() -> io::Result<()> {
    let (_dir, service) = service_with_projects(&["demo"]);
    let (mut rx, mut tx) = connect(&service);

    let params = uniform_params(1.5);
    let expected_id = ContributionId::digest(&params.encode()).to_string();

    let id = submit_params(&mut rx, &mut tx, "demo", &params)
        .await?
        .expect("submission should be accepted");

    assert_eq!(id, expected_id);
    assert_eq!(canonical_of(&service, "demo"), Some(params));

    Ok(())
}

#[tokio::test]
async fn second_contribution_is_averaged_in() -> io::Result<()> {
    let (_dir, service) = service_with_projects(&["demo"]);
    let (mut rx, mut tx) = connect(&service);

    submit_params(&mut rx, &mut tx, "demo", &uniform_params(2.0))
        .await?
        .expect("first submission");
    submit_params(&mut rx, &mut tx, "demo", &uniform_params(4.0))
        .await?
        .expect("second submission");

    assert_eq!(canonical_of(&service, "demo"), Some(uniform_params(3.0)));

    Ok(())
}

#[tokio::test]
async fn incompatible_shape_is_rejected_and_canonical_unchanged() -> io::Result<()> {
    let (_dir, service) = service_with_projects(&["demo"]);
    let (mut rx, mut tx) = connect(&service);

    let before = uniform_params(1.0);
    submit_params(&mut rx, &mut tx, "demo", &before)
        .await?
        .expect("seed submission");

    // One bias element too many for the definition.
    let wide = ParameterSet::new(vec![
        ArrayD::from_elem(IxDyn(&[2, 1]), 9.0),
        ArrayD::from_elem(IxDyn(&[2]), 9.0),
    ]);

    let rejection = submit_params(&mut rx, &mut tx, "demo", &wide)
        .await?
        .expect_err("shape mismatch should be rejected");

    assert_eq!(rejection.kind, RejectKind::ShapeMismatch);
    assert_eq!(canonical_of(&service, "demo"), Some(before));

    Ok(())
}

#[tokio::test]
async fn wrong_token_is_unauthorized_without_side_effects() -> io::Result<()> {
    let (_dir, service) = service_with_projects(&["demo"]);
    let (mut rx, mut tx) = connect(&service);

    let params = uniform_params(1.0);
    let payload = params.encode();
    let id = ContributionId::digest(&payload);

    let rejection = submit(&mut rx, &mut tx, "wrong", "demo", &id.to_string(), &payload)
        .await?
        .expect_err("bad token should be rejected");

    assert_eq!(rejection.kind, RejectKind::Unauthorized);
    assert_eq!(canonical_of(&service, "demo"), None);
    assert!(service.registry().store().get_pending("demo", &id).is_err());

    Ok(())
}

#[tokio::test]
async fn unknown_project_is_rejected() -> io::Result<()> {
    let (_dir, service) = service_with_projects(&["demo"]);
    let (mut rx, mut tx) = connect(&service);

    let rejection = submit_params(&mut rx, &mut tx, "ghost", &uniform_params(1.0))
        .await?
        .expect_err("unknown project should be rejected");

    assert_eq!(rejection.kind, RejectKind::ProjectNotFound);

    Ok(())
}

#[tokio::test]
async fn claimed_id_must_match_payload() -> io::Result<()> {
    let (_dir, service) = service_with_projects(&["demo"]);
    let (mut rx, mut tx) = connect(&service);

    let payload = uniform_params(1.0).encode();
    let wrong_id = ContributionId::digest(b"something else").to_string();

    let rejection = submit(&mut rx, &mut tx, TOKEN, "demo", &wrong_id, &payload)
        .await?
        .expect_err("id mismatch should be rejected");

    assert_eq!(rejection.kind, RejectKind::BadRequest);
    assert_eq!(canonical_of(&service, "demo"), None);

    Ok(())
}

#[tokio::test]
async fn resubmitting_identical_bytes_is_idempotent() -> io::Result<()> {
    let (_dir, service) = service_with_projects(&["demo"]);
    let (mut rx, mut tx) = connect(&service);

    let params = uniform_params(2.5);

    let first = submit_params(&mut rx, &mut tx, "demo", &params)
        .await?
        .expect("first submission");
    let second = submit_params(&mut rx, &mut tx, "demo", &params)
        .await?
        .expect("identical resubmission");

    assert_eq!(first, second);

    // Re-merging the same values against themselves is value-neutral.
    assert_eq!(canonical_of(&service, "demo"), Some(params));

    Ok(())
}

/// Two racing submissions must both land: the final canonical reflects both
/// merges in one of the two serial orders, never a single lost update.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_are_serialized_per_project() -> io::Result<()> {
    let (_dir, service) = service_with_projects(&["demo"]);

    // Seed a canonical so the two serial orders are distinguishable from
    // the lost-update outcomes.
    service
        .registry()
        .store()
        .save_canonical("demo", &uniform_params(0.0))
        .unwrap();

    let service_a = service.clone();
    let a = tokio::spawn(async move {
        let (mut rx, mut tx) = connect(&service_a);
        submit_params(&mut rx, &mut tx, "demo", &uniform_params(4.0)).await
    });

    let service_b = service.clone();
    let b = tokio::spawn(async move {
        let (mut rx, mut tx) = connect(&service_b);
        submit_params(&mut rx, &mut tx, "demo", &uniform_params(16.0)).await
    });

    a.await.unwrap()?.expect("submission a");
    b.await.unwrap()?.expect("submission b");

    // a then b: ((0+4)/2 + 16)/2 = 9; b then a: ((0+16)/2 + 4)/2 = 6.
    // Losing a merge would leave 2 or 8 instead.
    let canonical = canonical_of(&service, "demo").expect("canonical exists");
    assert!(
        canonical == uniform_params(9.0) || canonical == uniform_params(6.0),
        "lost update: canonical is {canonical:?}"
    );

    Ok(())
}

/// Holding one project's merge lock must not stall submissions to another.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn projects_do_not_share_a_lock() -> io::Result<()> {
    let (_dir, service) = service_with_projects(&["alpha", "beta"]);

    let alpha_lock = service.registry().merge_lock("alpha");
    let _held = alpha_lock.lock().await;

    let (mut rx, mut tx) = connect(&service);
    let outcome = timeout(
        Duration::from_secs(5),
        submit_params(&mut rx, &mut tx, "beta", &uniform_params(1.0)),
    )
    .await
    .expect("submission to beta must not block on alpha's lock")?;

    outcome.expect("submission to beta");
    assert_eq!(canonical_of(&service, "beta"), Some(uniform_params(1.0)));

    Ok(())
}

#[tokio::test]
async fn ping_pong_roundtrip() -> io::Result<()> {
    let (_dir, service) = service_with_projects(&[]);
    let (mut rx, mut tx) = connect(&service);

    tx.send(&Msg::Control(Command::Ping)).await?;

    let reply: Msg = rx.recv().await?;
    assert!(matches!(reply, Msg::Control(Command::Pong)));

    Ok(())
}

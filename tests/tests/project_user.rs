use morpho_load_tests::*;

use morpho_load::{ProjectUser, TaskError};
use ntest::timeout;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::collections::HashSet;

fn user(host: &str, seed: u64) -> ProjectUser {
    ProjectUser::with_rng(client(host), SmallRng::seed_from_u64(seed))
}

fn cached_keys(user: &ProjectUser) -> HashSet<String> {
    user.cache()
        .expect("projects not cached")
        .keys()
        .iter()
        .cloned()
        .collect()
}

#[tokio::test]
#[timeout(10000)]
async fn solution_before_listing_sends_nothing() {
    let (state, host) = mock(["p1", "p2"]).await;
    let mut user = user(&host, 1);

    for _ in 0..5 {
        user.test_solution().await.unwrap();
    }

    assert!(user.cache().is_none());
    assert!(state.hits().is_empty());
}

#[tokio::test]
#[timeout(10000)]
async fn listing_is_cached_once() {
    let (state, host) = mock(["p1", "p2"]).await;
    let mut user = user(&host, 2);

    user.test_project().await.unwrap();
    assert_eq!(
        cached_keys(&user),
        HashSet::from(["p1".to_string(), "p2".to_string()])
    );

    state.set_projects(["p3"]);
    for _ in 0..3 {
        user.test_project().await.unwrap();
    }

    assert_eq!(state.hit_count("/project/"), 4);
    assert_eq!(
        cached_keys(&user),
        HashSet::from(["p1".to_string(), "p2".to_string()])
    );
}

#[tokio::test]
#[timeout(10000)]
async fn solution_requests_one_cached_project() {
    let (state, host) = mock(["p1", "p2"]).await;
    let mut user = user(&host, 3);
    user.test_project().await.unwrap();
    state.clear_hits();

    user.test_solution().await.unwrap();

    let hits = state.hits();
    assert_eq!(hits.len(), 1);
    assert!(
        hits[0] == "/project/p1/models/" || hits[0] == "/project/p2/models/",
        "unexpected request {}",
        hits[0]
    );
}

#[tokio::test]
#[timeout(10000)]
async fn solution_covers_every_cached_project() {
    let (state, host) = mock(["p1", "p2"]).await;
    let mut user = user(&host, 4);
    user.test_project().await.unwrap();
    state.clear_hits();

    for _ in 0..40 {
        user.test_solution().await.unwrap();
    }

    let paths: HashSet<_> = state.hits().into_iter().collect();
    assert_eq!(
        paths,
        HashSet::from([
            "/project/p1/models/".to_string(),
            "/project/p2/models/".to_string()
        ])
    );
}

#[tokio::test]
#[timeout(10000)]
async fn single_project_is_always_chosen() {
    let (state, host) = mock(["alpha"]).await;
    let mut user = user(&host, 5);

    user.test_project().await.unwrap();
    user.test_solution().await.unwrap();

    assert_eq!(
        state.hits(),
        vec!["/project/".to_string(), "/project/alpha/models/".to_string()]
    );
}

#[tokio::test]
#[timeout(10000)]
async fn malformed_listing_leaves_cache_unset() {
    let (state, host) = mock(["p1"]).await;
    state.set_broken(true);
    let mut user = user(&host, 6);

    let err = user.test_project().await.unwrap_err();
    assert!(matches!(err, TaskError::Parse { .. }), "{err}");
    assert!(user.cache().is_none());

    user.test_solution().await.unwrap();
    assert_eq!(state.hits(), vec!["/project/".to_string()]);

    // NOTE: A later good listing is still cached.
    state.set_broken(false);
    user.test_project().await.unwrap();
    assert_eq!(cached_keys(&user), HashSet::from(["p1".to_string()]));
}

#[tokio::test]
#[timeout(10000)]
async fn error_status_leaves_cache_unset() {
    let (_state, host) = mock(["p1"]).await;
    let mut user = user(&format!("{host}/missing"), 7);

    let err = user.test_project().await.unwrap_err();
    assert!(
        matches!(err, TaskError::Status { ref path, status } if path == "/project/" && status.as_u16() == 404),
        "{err}"
    );
    assert!(user.cache().is_none());
}

#[tokio::test]
#[timeout(10000)]
async fn empty_listing_is_cached_but_unused() {
    let (state, host) = mock(Vec::<String>::new()).await;
    let mut user = user(&host, 8);

    user.test_project().await.unwrap();
    assert!(cached_keys(&user).is_empty());

    user.test_solution().await.unwrap();
    assert_eq!(state.hits(), vec!["/project/".to_string()]);
}

#[tokio::test]
#[timeout(10000)]
async fn project_ids_are_path_encoded() {
    let (state, host) = mock(["a b"]).await;
    let mut user = user(&host, 9);

    user.test_project().await.unwrap();
    user.test_solution().await.unwrap();

    assert_eq!(state.hit_count("/project/a%20b/models/"), 1);
}

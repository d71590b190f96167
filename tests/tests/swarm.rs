#[allow(unused)]
use morpho_load_tests::*;

#[cfg(feature = "integration")]
mod tests {
    use super::*;

    use morpho_load::prelude::*;
    use morpho_load::user::{MODELS_NAME, PROJECTS_PATH};
    use morpho_load::ProjectUser;
    use std::num::NonZeroU32;
    use std::time::Duration;

    #[tokio::test]
    async fn swarm_hits_both_endpoints() {
        let (state, host) = mock(["p1", "p2", "p3"]).await;

        let stats = Swarm::new(
            SwarmConfig::new(&host)
                .users(5)
                .spawn_rate(50.)
                .wait(WaitTime::Between(
                    Duration::from_millis(5),
                    Duration::from_millis(20),
                ))
                .run_time(Duration::from_secs(2)),
        )
        .run::<ProjectUser>()
        .await
        .unwrap();

        assert_eq!(stats.users, 5);
        assert!(!stats.has_failures(), "{stats}");

        let projects = stats.request(PROJECTS_PATH).unwrap();
        let models = stats.request(MODELS_NAME).unwrap();
        assert!(projects.requests > 0);
        assert!(models.requests > 0);
        assert!(stats.task("test_project").is_some());
        assert!(stats.task("test_solution").is_some());

        for hit in state.hits() {
            assert!(
                hit == "/project/"
                    || ["p1", "p2", "p3"]
                        .iter()
                        .any(|id| hit == format!("/project/{id}/models/")),
                "unexpected request {hit}"
            );
        }
    }

    #[tokio::test]
    async fn swarm_respects_rate_cap() {
        let (state, host) = mock(["p1"]).await;

        let stats = Swarm::new(
            SwarmConfig::new(&host)
                .users(10)
                .spawn_rate(0.)
                .max_rps(NonZeroU32::new(20).unwrap())
                .run_time(Duration::from_secs(1)),
        )
        .run::<ProjectUser>()
        .await
        .unwrap();

        let total = stats.total_requests().unwrap();
        // NOTE: The limiter starts with a full one second burst.
        assert!(dbg!(total.requests) <= 45);
        assert!(state.hits().len() <= 45);
    }

    #[tokio::test]
    async fn swarm_records_malformed_listings() {
        let (state, host) = mock(["p1"]).await;
        state.set_broken(true);

        let stats = Swarm::new(
            SwarmConfig::new(&host)
                .users(2)
                .spawn_rate(0.)
                .wait(WaitTime::Constant(Duration::from_millis(10)))
                .run_time(Duration::from_millis(500)),
        )
        .run::<ProjectUser>()
        .await
        .unwrap();

        // Requests themselves succeed, the listing task fails to parse them.
        assert_eq!(stats.request(PROJECTS_PATH).unwrap().failures, 0);
        assert!(stats.request(MODELS_NAME).is_none());
        let listing = stats.task("test_project").unwrap();
        assert_eq!(listing.failures, listing.requests);
        assert!(stats.has_failures());
    }
}

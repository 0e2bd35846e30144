//! CORS index integration tests.

#[cfg(test)]
mod tests {
    use objstore_core::{AccountId, AwsRegion};
    use objstore_s3::cors::CorsRule;

    use crate::{test_bucket_name, test_state};

    fn rule(origin: &str) -> CorsRule {
        CorsRule {
            allowed_origins: vec![origin.to_owned()],
            allowed_methods: vec!["GET".to_owned(), "PUT".to_owned()],
            allowed_headers: vec!["*".to_owned()],
            max_age_seconds: Some(600),
            ..CorsRule::default()
        }
    }

    #[test]
    fn test_should_match_cors_across_partitions() {
        let state = test_state();
        let other = AccountId::new("222222222222").expect("account");
        let region = AwsRegion::new("eu-central-1");
        let name = test_bucket_name("cors");
        state
            .create_bucket(&name, &other, &region, false)
            .expect("create");
        state
            .put_bucket_cors(&name, &other, &region, vec![rule("https://*.example.com")])
            .expect("put cors");

        let matched = state
            .match_cors(
                &name,
                "https://app.example.com",
                "put",
                &["Content-Type".to_owned()],
            )
            .expect("match");
        assert_eq!(matched.allowed_origin, "https://app.example.com");
        assert_eq!(matched.allowed_headers, vec!["content-type"]);
        assert_eq!(matched.max_age_seconds, Some(600));

        assert!(
            state
                .match_cors(&name, "https://evil.test", "GET", &[])
                .is_none()
        );
    }

    #[test]
    fn test_should_reflect_bucket_changes_in_index() {
        let state = test_state();
        let account = AccountId::default();
        let region = AwsRegion::default();
        let name = test_bucket_name("corsidx");

        assert!(!state.cors_index().contains_bucket(&name));
        state
            .create_bucket(&name, &account, &region, false)
            .expect("create");
        assert!(state.cors_index().contains_bucket(&name));

        state
            .put_bucket_cors(&name, &account, &region, vec![rule("*")])
            .expect("put cors");
        assert_eq!(state.cors_index().rules(&name).map(<[_]>::len), Some(1));

        state
            .delete_bucket(&name, &account, &region)
            .expect("delete");
        let index = state.cors_index();
        assert!(!index.contains_bucket(&name));
        assert!(index.rules(&name).is_none());
    }

    #[test]
    fn test_should_serve_consistent_index_under_concurrent_changes() {
        let state = test_state();
        let account = AccountId::default();
        let region = AwsRegion::default();
        let names: Vec<String> = (0..8).map(|_| test_bucket_name("corsconc")).collect();

        std::thread::scope(|s| {
            for name in &names {
                let (state, account, region) = (&state, &account, &region);
                s.spawn(move || {
                    state
                        .create_bucket(name, account, region, false)
                        .expect("create");
                    state
                        .put_bucket_cors(name, account, region, vec![rule("*")])
                        .expect("put cors");
                });
            }
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..20 {
                        let index = state.cors_index();
                        for name in index.cors.keys() {
                            assert!(index.contains_bucket(name));
                        }
                    }
                });
            }
        });

        let index = state.cors_index();
        for name in &names {
            assert!(index.contains_bucket(name));
            assert!(
                state
                    .match_cors(name, "https://any.test", "GET", &[])
                    .is_some()
            );
        }
    }
}

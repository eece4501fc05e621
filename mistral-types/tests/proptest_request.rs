//! Property-based tests: request builder clamping.

use mistral_types::*;
use proptest::prelude::*;

proptest! {
    #[test]
    fn temperature_always_in_range(value in any::<f32>()) {
        let request = CompletionRequest::builder().temperature(value).build();
        prop_assert!((0.0..=2.0).contains(&request.temperature));
    }

    #[test]
    fn top_p_always_in_range(value in any::<f32>()) {
        let request = CompletionRequest::builder().top_p(value).build();
        prop_assert!((0.0..=1.0).contains(&request.top_p));
    }

    #[test]
    fn max_tokens_at_least_one(value in any::<u32>()) {
        let request = CompletionRequest::builder().max_tokens(value).build();
        prop_assert!(request.max_tokens >= 1);
    }

    #[test]
    fn in_range_values_are_kept(t in 0.0f32..=2.0, p in 0.0f32..=1.0) {
        let request = CompletionRequest::builder().temperature(t).top_p(p).build();
        prop_assert_eq!(request.temperature, t);
        prop_assert_eq!(request.top_p, p);
    }

    #[test]
    fn role_wire_name_parses_back(role in prop_oneof![
        Just(Role::User),
        Just(Role::Assistant),
        Just(Role::System),
    ]) {
        prop_assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
    }
}

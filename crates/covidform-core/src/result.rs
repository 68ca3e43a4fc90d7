//! Two-branch outcome type for expected request failures.
//!
//! `Outcome` is what front-end call sites get back from the admin services:
//! a rejected form submission or a missing record is not an error in the
//! `Result` sense, it is a normal branch the caller has to render. The
//! combinators only ever run the callback of the branch that is present.
//!
//! The `*_async` variants take callbacks that return futures, so handlers can
//! issue follow-up requests without nesting matches.

use std::future::Future;

use crate::api::{ApiResponse, ResponseData};

#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Outcome<S, F> {
    Success(S),
    Failure(F),
}

impl Outcome<ResponseData, ResponseData> {
    /// 2xx responses become `Success`, everything else `Failure`; either
    /// way the branch carries the response body.
    pub fn from_response(response: &ApiResponse) -> Self {
        if response.is_success() {
            Outcome::Success(response.data())
        } else {
            Outcome::Failure(response.data())
        }
    }
}

impl<S, F> Outcome<S, F> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    pub fn success(self) -> Option<S> {
        match self {
            Outcome::Success(data) => Some(data),
            Outcome::Failure(_) => None,
        }
    }

    pub fn failure(self) -> Option<F> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(data) => Some(data),
        }
    }

    pub fn as_ref(&self) -> Outcome<&S, &F> {
        match self {
            Outcome::Success(data) => Outcome::Success(data),
            Outcome::Failure(data) => Outcome::Failure(data),
        }
    }

    pub fn on_success(self, handler: impl FnOnce(&S)) -> Self {
        if let Outcome::Success(ref data) = self {
            handler(data);
        }
        self
    }

    pub fn on_failure(self, handler: impl FnOnce(&F)) -> Self {
        if let Outcome::Failure(ref data) = self {
            handler(data);
        }
        self
    }

    pub fn transform<S2>(self, transformer: impl FnOnce(S) -> S2) -> Outcome<S2, F> {
        match self {
            Outcome::Success(data) => Outcome::Success(transformer(data)),
            Outcome::Failure(data) => Outcome::Failure(data),
        }
    }

    pub fn transform_failure<F2>(self, transformer: impl FnOnce(F) -> F2) -> Outcome<S, F2> {
        match self {
            Outcome::Success(data) => Outcome::Success(data),
            Outcome::Failure(data) => Outcome::Failure(transformer(data)),
        }
    }

    /// Continue with another fallible step; failures short-circuit.
    pub fn chain<S2>(self, next: impl FnOnce(S) -> Outcome<S2, F>) -> Outcome<S2, F> {
        match self {
            Outcome::Success(data) => next(data),
            Outcome::Failure(data) => Outcome::Failure(data),
        }
    }

    /// Give a failure a second chance; successes pass through.
    pub fn recover(self, fallback: impl FnOnce(F) -> Outcome<S, F>) -> Outcome<S, F> {
        match self {
            Outcome::Success(data) => Outcome::Success(data),
            Outcome::Failure(data) => fallback(data),
        }
    }

    pub fn into_result(self) -> Result<S, F> {
        match self {
            Outcome::Success(data) => Ok(data),
            Outcome::Failure(data) => Err(data),
        }
    }

    pub async fn on_success_async<Fut>(self, handler: impl FnOnce(&S) -> Fut) -> Self
    where
        Fut: Future<Output = ()>,
    {
        if let Outcome::Success(ref data) = self {
            handler(data).await;
        }
        self
    }

    pub async fn on_failure_async<Fut>(self, handler: impl FnOnce(&F) -> Fut) -> Self
    where
        Fut: Future<Output = ()>,
    {
        if let Outcome::Failure(ref data) = self {
            handler(data).await;
        }
        self
    }

    pub async fn transform_async<S2, Fut>(self, transformer: impl FnOnce(S) -> Fut) -> Outcome<S2, F>
    where
        Fut: Future<Output = S2>,
    {
        match self {
            Outcome::Success(data) => Outcome::Success(transformer(data).await),
            Outcome::Failure(data) => Outcome::Failure(data),
        }
    }

    pub async fn transform_failure_async<F2, Fut>(
        self,
        transformer: impl FnOnce(F) -> Fut,
    ) -> Outcome<S, F2>
    where
        Fut: Future<Output = F2>,
    {
        match self {
            Outcome::Success(data) => Outcome::Success(data),
            Outcome::Failure(data) => Outcome::Failure(transformer(data).await),
        }
    }

    pub async fn chain_async<S2, Fut>(self, next: impl FnOnce(S) -> Fut) -> Outcome<S2, F>
    where
        Fut: Future<Output = Outcome<S2, F>>,
    {
        match self {
            Outcome::Success(data) => next(data).await,
            Outcome::Failure(data) => Outcome::Failure(data),
        }
    }

    pub async fn recover_async<Fut>(self, fallback: impl FnOnce(F) -> Fut) -> Outcome<S, F>
    where
        Fut: Future<Output = Outcome<S, F>>,
    {
        match self {
            Outcome::Success(data) => Outcome::Success(data),
            Outcome::Failure(data) => fallback(data).await,
        }
    }
}

impl<S, F> From<Result<S, F>> for Outcome<S, F> {
    fn from(result: Result<S, F>) -> Self {
        match result {
            Ok(data) => Outcome::Success(data),
            Err(data) => Outcome::Failure(data),
        }
    }
}

impl<S, F> From<Outcome<S, F>> for Result<S, F> {
    fn from(outcome: Outcome<S, F>) -> Self {
        outcome.into_result()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
    use reqwest::StatusCode;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_only_matching_branch_runs() {
        let successes = Cell::new(0);
        let failures = Cell::new(0);

        let _ = Outcome::<i32, &str>::Success(1)
            .on_success(|_| successes.set(successes.get() + 1))
            .on_failure(|_| failures.set(failures.get() + 1));
        let _ = Outcome::<i32, &str>::Failure("no")
            .on_success(|_| successes.set(successes.get() + 1))
            .on_failure(|_| failures.set(failures.get() + 1));

        assert_eq!(successes.get(), 1);
        assert_eq!(failures.get(), 1);
    }

    #[test]
    fn test_transform_and_transform_failure() {
        let doubled = Outcome::<i32, String>::Success(21).transform(|n| n * 2);
        assert_eq!(doubled, Outcome::Success(42));

        let untouched = Outcome::<i32, String>::Failure("bad".into()).transform(|n| n * 2);
        assert_eq!(untouched, Outcome::Failure("bad".to_string()));

        let described = Outcome::<i32, i32>::Failure(404).transform_failure(|code| format!("E{}", code));
        assert_eq!(described, Outcome::Failure("E404".to_string()));
    }

    #[test]
    fn test_chain_short_circuits() {
        let parse = |s: &str| -> Outcome<i32, String> {
            s.parse::<i32>()
                .map_err(|e| e.to_string())
                .into()
        };

        let chained = Outcome::<&str, String>::Success("7").chain(parse);
        assert_eq!(chained, Outcome::Success(7));

        let called = Cell::new(false);
        let skipped = Outcome::<&str, String>::Failure("earlier".into()).chain(|s| {
            called.set(true);
            parse(s)
        });
        assert_eq!(skipped, Outcome::Failure("earlier".to_string()));
        assert!(!called.get());
    }

    #[test]
    fn test_recover_only_on_failure() {
        let recovered = Outcome::<i32, i32>::Failure(404).recover(|_| Outcome::Success(0));
        assert_eq!(recovered, Outcome::Success(0));

        let kept = Outcome::<i32, i32>::Success(5).recover(|_| Outcome::Success(0));
        assert_eq!(kept, Outcome::Success(5));
    }

    #[test]
    fn test_from_response() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let ok = ApiResponse::from_parts(StatusCode::CREATED, headers.clone(), r#"{"id":3}"#);
        assert_eq!(
            Outcome::from_response(&ok),
            Outcome::Success(ResponseData::Json(json!({"id": 3})))
        );

        let rejected = ApiResponse::from_parts(StatusCode::NOT_FOUND, headers, r#"{"code":"not_found"}"#);
        let failure = Outcome::from_response(&rejected).failure().unwrap();
        assert_eq!(failure.code(), Some("not_found"));
    }

    #[tokio::test]
    async fn test_async_combinators() {
        let outcome = Outcome::<i32, String>::Success(2)
            .chain_async(|n| async move { Outcome::Success(n + 1) })
            .await
            .transform_async(|n| async move { n * 10 })
            .await;
        assert_eq!(outcome, Outcome::Success(30));

        let recovered = Outcome::<i32, String>::Failure("missing".into())
            .recover_async(|reason| async move {
                if reason == "missing" {
                    Outcome::Success(0)
                } else {
                    Outcome::Failure(reason)
                }
            })
            .await;
        assert_eq!(recovered, Outcome::Success(0));

        let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
        let sink = seen.clone();
        let _ = Outcome::<i32, String>::Failure("late".into())
            .on_failure_async(|reason| {
                let reason = reason.clone();
                async move {
                    *sink.lock().unwrap() = Some(reason);
                }
            })
            .await;
        assert_eq!(seen.lock().unwrap().as_deref(), Some("late"));
    }
}

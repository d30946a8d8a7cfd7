//! Bounded retries with an environment reset between attempts.

use std::fmt::Display;

use futures::future::BoxFuture;
use tracing::warn;

/// Outcome of [`with_retries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T, E> {
    /// An attempt succeeded.
    Ok(T),
    /// Every attempt failed.
    ExhaustedRetries {
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        last_error: E,
    },
}

impl<T, E> RetryOutcome<T, E> {
    /// Convert into a `Result`, mapping exhaustion through `f`.
    pub fn into_result<F, E2>(self, f: F) -> Result<T, E2>
    where
        F: FnOnce(u32, E) -> E2,
    {
        match self {
            RetryOutcome::Ok(v) => Ok(v),
            RetryOutcome::ExhaustedRetries {
                attempts,
                last_error,
            } => Err(f(attempts, last_error)),
        }
    }
}

/// Run `action` up to `attempts` times against `state`, calling `reset` after each failure
/// except the last.
pub async fn with_retries<S, T, E>(
    attempts: u32,
    state: &mut S,
    mut reset: impl for<'a> FnMut(&'a mut S) -> BoxFuture<'a, ()>,
    mut action: impl for<'a> FnMut(&'a mut S) -> BoxFuture<'a, Result<T, E>>,
) -> RetryOutcome<T, E>
where
    E: Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match action(state).await {
            Ok(v) => return RetryOutcome::Ok(v),
            Err(e) if attempt >= attempts => {
                return RetryOutcome::ExhaustedRetries {
                    attempts: attempt,
                    last_error: e,
                }
            }
            Err(e) => {
                warn!(attempt, max_attempts = attempts, error = %e, "Attempt failed, resetting");
                reset(state).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Counter {
        calls: u32,
        resets: u32,
        succeed_on: u32,
    }

    #[tokio::test]
    async fn succeeds_after_reset() {
        let mut c = Counter {
            succeed_on: 2,
            ..Default::default()
        };
        let out = with_retries(
            3,
            &mut c,
            |c| {
                Box::pin(async move {
                    c.resets += 1;
                })
            },
            |c| {
                Box::pin(async move {
                    c.calls += 1;
                    if c.calls >= c.succeed_on {
                        Ok(c.calls)
                    } else {
                        Err("not yet")
                    }
                })
            },
        )
        .await;
        assert_eq!(out, RetryOutcome::Ok(2));
        assert_eq!(c.resets, 1);
    }

    #[tokio::test]
    async fn exhausts_without_trailing_reset() {
        let mut c = Counter {
            succeed_on: u32::MAX,
            ..Default::default()
        };
        let out = with_retries(
            3,
            &mut c,
            |c| {
                Box::pin(async move {
                    c.resets += 1;
                })
            },
            |c| {
                Box::pin(async move {
                    c.calls += 1;
                    Err::<u32, _>(format!("fail {}", c.calls))
                })
            },
        )
        .await;
        assert_eq!(
            out,
            RetryOutcome::ExhaustedRetries {
                attempts: 3,
                last_error: "fail 3".to_string()
            }
        );
        assert_eq!(c.calls, 3);
        assert_eq!(c.resets, 2);
    }

    #[test]
    fn into_result_maps_exhaustion() {
        let ok: RetryOutcome<u8, &str> = RetryOutcome::Ok(7);
        assert_eq!(tokio_test::assert_ok!(ok.into_result(|_, e| e.len())), 7);

        let failed: RetryOutcome<u8, &str> = RetryOutcome::ExhaustedRetries {
            attempts: 3,
            last_error: "down",
        };
        let err = tokio_test::assert_err!(failed.into_result(|n, e| format!("{n}: {e}")));
        assert_eq!(err, "3: down");
    }
}

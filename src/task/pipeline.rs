//! Pipeline stages (§4.5): each is a method threading a `TaskResult` through
//! to the next stage's input, composed by chaining calls rather than by the
//! source's template-metaprogrammed stage objects (Design Note 9: "the
//! source pattern's heavy template metaprogramming is not essential").
//!
//! Every stage is gated through the supplied `lifetime`: a pipeline built on
//! a scope that later closes simply stops delivering further down the
//! chain, per §4.5 "a dropped scope silently deactivates the whole
//! pipeline".

use crate::lifetime::SlokedLifetime;

use super::{task_result, Outcome, TaskResult};

impl<R, E> TaskResult<R, E>
where
    R: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// `map(f)`: Ready → apply `f`, a returned `Err` becomes the pipeline's
    /// error; Error/Cancelled propagate unchanged.
    pub fn map<R2, F>(self, lifetime: &SlokedLifetime, f: F) -> TaskResult<R2, E>
    where
        R2: Send + 'static,
        F: FnOnce(R) -> Result<R2, E> + Send + 'static,
    {
        let (supplier, out) = task_result();
        self.notify(
            move |outcome| match outcome {
                Outcome::Ready(v) => {
                    let _ = supplier.wrap(|| f(v.clone()));
                }
                Outcome::Error(e) => {
                    let _ = supplier.set_error(e.clone());
                }
                Outcome::Cancelled => {
                    let _ = supplier.cancel();
                }
            },
            lifetime,
        );
        out
    }

    /// `mapError(g)`: Error → apply `g`; Ready/Cancelled propagate.
    pub fn map_error<E2, G>(self, lifetime: &SlokedLifetime, g: G) -> TaskResult<R, E2>
    where
        E2: Send + 'static,
        G: FnOnce(E) -> E2 + Send + 'static,
    {
        let (supplier, out) = task_result();
        self.notify(
            move |outcome| match outcome {
                Outcome::Ready(v) => {
                    let _ = supplier.set_result(v.clone());
                }
                Outcome::Error(e) => {
                    let _ = supplier.set_error(g(e.clone()));
                }
                Outcome::Cancelled => {
                    let _ = supplier.cancel();
                }
            },
            lifetime,
        );
        out
    }

    /// `mapCancelled(h)`: Cancelled → apply `h`, which may itself fail into
    /// `Error`; Ready/Error propagate.
    pub fn map_cancelled<H>(self, lifetime: &SlokedLifetime, h: H) -> TaskResult<R, E>
    where
        H: FnOnce() -> Result<R, E> + Send + 'static,
    {
        let (supplier, out) = task_result();
        self.notify(
            move |outcome| match outcome {
                Outcome::Ready(v) => {
                    let _ = supplier.set_result(v.clone());
                }
                Outcome::Error(e) => {
                    let _ = supplier.set_error(e.clone());
                }
                Outcome::Cancelled => {
                    let _ = supplier.wrap(h);
                }
            },
            lifetime,
        );
        out
    }

    /// `catch(c)`: Error → apply `c` and produce `Ready`; Ready/Cancelled
    /// propagate.
    pub fn catch<C>(self, lifetime: &SlokedLifetime, c: C) -> TaskResult<R, E>
    where
        C: FnOnce(E) -> R + Send + 'static,
    {
        let (supplier, out) = task_result();
        self.notify(
            move |outcome| match outcome {
                Outcome::Ready(v) => {
                    let _ = supplier.set_result(v.clone());
                }
                Outcome::Error(e) => {
                    let _ = supplier.set_result(c(e.clone()));
                }
                Outcome::Cancelled => {
                    let _ = supplier.cancel();
                }
            },
            lifetime,
        );
        out
    }

    /// `async(g)`: Ready → flat-map into `g(x, lifetime)`; Error/Cancelled
    /// propagate without invoking `g`.
    pub fn async_then<R2, G>(self, lifetime: &SlokedLifetime, g: G) -> TaskResult<R2, E>
    where
        R2: Clone + Send + 'static,
        G: FnOnce(R, &SlokedLifetime) -> TaskResult<R2, E> + Send + 'static,
    {
        let (supplier, out) = task_result();
        let inner_lifetime = lifetime.clone();
        self.notify(
            move |outcome| match outcome {
                Outcome::Ready(v) => {
                    let inner = g(v.clone(), &inner_lifetime);
                    inner.notify(
                        move |inner_outcome| match inner_outcome {
                            Outcome::Ready(v2) => {
                                let _ = supplier.set_result(v2.clone());
                            }
                            Outcome::Error(e2) => {
                                let _ = supplier.set_error(e2.clone());
                            }
                            Outcome::Cancelled => {
                                let _ = supplier.cancel();
                            }
                        },
                        &inner_lifetime,
                    );
                }
                Outcome::Error(e) => {
                    let _ = supplier.set_error(e.clone());
                }
                Outcome::Cancelled => {
                    let _ = supplier.cancel();
                }
            },
            lifetime,
        );
        out
    }

    /// `scan(s)`: runs `s` as a Ready-only side effect, passes the value
    /// through unchanged.
    pub fn scan<S>(self, lifetime: &SlokedLifetime, s: S) -> TaskResult<R, E>
    where
        S: FnOnce(&R) + Send + 'static,
    {
        let (supplier, out) = task_result();
        self.notify(
            move |outcome| match outcome {
                Outcome::Ready(v) => {
                    s(v);
                    let _ = supplier.set_result(v.clone());
                }
                Outcome::Error(e) => {
                    let _ = supplier.set_error(e.clone());
                }
                Outcome::Cancelled => {
                    let _ = supplier.cancel();
                }
            },
            lifetime,
        );
        out
    }

    /// `scanErrors(s)`: Error-only side effect, passes through unchanged.
    pub fn scan_errors<S>(self, lifetime: &SlokedLifetime, s: S) -> TaskResult<R, E>
    where
        S: FnOnce(&E) + Send + 'static,
    {
        let (supplier, out) = task_result();
        self.notify(
            move |outcome| match outcome {
                Outcome::Ready(v) => {
                    let _ = supplier.set_result(v.clone());
                }
                Outcome::Error(e) => {
                    s(e);
                    let _ = supplier.set_error(e.clone());
                }
                Outcome::Cancelled => {
                    let _ = supplier.cancel();
                }
            },
            lifetime,
        );
        out
    }

    /// `scanCancelled(s)`: Cancelled-only side effect, passes through
    /// unchanged.
    pub fn scan_cancelled<S>(self, lifetime: &SlokedLifetime, s: S) -> TaskResult<R, E>
    where
        S: FnOnce() + Send + 'static,
    {
        let (supplier, out) = task_result();
        self.notify(
            move |outcome| match outcome {
                Outcome::Ready(v) => {
                    let _ = supplier.set_result(v.clone());
                }
                Outcome::Error(e) => {
                    let _ = supplier.set_error(e.clone());
                }
                Outcome::Cancelled => {
                    s();
                    let _ = supplier.cancel();
                }
            },
            lifetime,
        );
        out
    }

    /// `finally(s)`: runs for every outcome, passes through unchanged.
    pub fn finally<S>(self, lifetime: &SlokedLifetime, s: S) -> TaskResult<R, E>
    where
        S: FnOnce(&Outcome<R, E>) + Send + 'static,
    {
        let (supplier, out) = task_result();
        self.notify(
            move |outcome| {
                s(outcome);
                match outcome {
                    Outcome::Ready(v) => {
                        let _ = supplier.set_result(v.clone());
                    }
                    Outcome::Error(e) => {
                        let _ = supplier.set_error(e.clone());
                    }
                    Outcome::Cancelled => {
                        let _ = supplier.cancel();
                    }
                }
            },
            lifetime,
        );
        out
    }

    /// `pass`: identity stage.
    pub fn pass(self) -> TaskResult<R, E> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::task_result;

    #[test]
    fn map_then_catch_recovers_from_error() {
        let lifetime = SlokedLifetime::new();
        let (supplier, src) = task_result::<i32, String>();
        let piped = src
            .map(&lifetime, |x| Ok::<i32, String>(x + 1))
            .catch(&lifetime, |_e| 0);
        supplier.set_error("boom".to_string()).unwrap();
        assert_eq!(piped.unwrap().unwrap(), 0);
    }

    #[test]
    fn map_chain_applies_in_order() {
        let lifetime = SlokedLifetime::new();
        let (supplier, src) = task_result::<i32, String>();
        let piped = src.map(&lifetime, |x| Ok::<i32, String>(x + 1)).map(&lifetime, |x| Ok::<i32, String>(x * 2));
        supplier.set_result(10).unwrap();
        assert_eq!(piped.unwrap().unwrap(), 22);
    }

    #[test]
    fn scan_observes_without_changing_value() {
        let lifetime = SlokedLifetime::new();
        let (supplier, src) = task_result::<i32, String>();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
        let seen2 = seen.clone();
        let piped = src.scan(&lifetime, move |v| *seen2.lock().unwrap() = Some(*v));
        supplier.set_result(5).unwrap();
        assert_eq!(piped.unwrap().unwrap(), 5);
        assert_eq!(*seen.lock().unwrap(), Some(5));
    }

    #[test]
    fn async_then_flattens_inner_task() {
        let lifetime = SlokedLifetime::new();
        let (supplier, src) = task_result::<i32, String>();
        let piped = src.async_then(&lifetime, |x, _lifetime| {
            let (inner_supplier, inner) = task_result::<i32, String>();
            inner_supplier.set_result(x * 10).unwrap();
            inner
        });
        supplier.set_result(4).unwrap();
        assert_eq!(piped.unwrap().unwrap(), 40);
    }

    #[test]
    fn cancellation_propagates_through_map() {
        let lifetime = SlokedLifetime::new();
        let (supplier, src) = task_result::<i32, String>();
        let piped = src.map(&lifetime, |x| Ok::<i32, String>(x + 1));
        supplier.cancel().unwrap();
        assert_eq!(piped.state(), crate::task::TaskState::Cancelled);
    }
}

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    thread,
};

use tracing::{error, info_span};

use super::Communicator;
use crate::Error;

/// Launches one thread per rank and collects their results
pub struct Universe;
impl Universe {
    /// Run `f` on `nranks` rank threads, each with its own [`Communicator`].
    ///
    /// A rank that fails or panics broadcasts an abort so that ranks blocked
    /// in a receive return [`Error::Aborted`]. The error reported is the one
    /// that started the abort, not the echoes it caused.
    pub fn run<R, F>(nranks: usize, f: F) -> Result<Vec<R>, Error>
    where
        R: Send,
        F: Fn(&mut Communicator) -> Result<R, Error> + Sync,
    {
        if nranks == 0 {
            return Err(Error::config("At least one rank is required"));
        }
        let comms = Communicator::create(nranks);
        let f = &f;
        let results: Vec<Result<R, Error>> = thread::scope(|s| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|mut comm| {
                    s.spawn(move || {
                        let rank = comm.rank();
                        let _span = info_span!("rank", rank).entered();
                        let result = match panic::catch_unwind(AssertUnwindSafe(|| f(&mut comm))) {
                            Ok(result) => result,
                            Err(payload) => Err(Error::Panicked {
                                rank,
                                message: panic_message(payload.as_ref()),
                            }),
                        };
                        match &result {
                            Err(e) if !e.is_abort() => {
                                error!("Rank {} failed: {}", rank, e);
                                comm.abort(&e.to_string());
                            }
                            _ => comm.finish(),
                        }
                        result
                    })
                })
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(rank, h)| {
                    h.join().unwrap_or_else(|payload| {
                        Err(Error::Panicked {
                            rank,
                            message: panic_message(payload.as_ref()),
                        })
                    })
                })
                .collect()
        });

        let mut values = Vec::with_capacity(nranks);
        let mut echo: Option<Error> = None;
        let mut origin: Option<Error> = None;
        for result in results {
            match result {
                Ok(v) => values.push(v),
                Err(e) if e.is_abort() || matches!(e, Error::Disconnected(_)) => {
                    echo.get_or_insert(e);
                }
                Err(e) => {
                    origin.get_or_insert(e);
                }
            }
        }
        match origin.or(echo) {
            Some(e) => Err(e),
            None => Ok(values),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

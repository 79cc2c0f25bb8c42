//! [`Background`] running the periodic [`Task`]s of a [`Service`].
//!
//! [`Service`]: crate::Service

use std::{
    error::Error,
    future::{Future, IntoFuture},
    iter,
};

use derive_more::Display;
use futures::{
    future::{self, LocalBoxFuture},
    FutureExt as _, TryFutureExt as _,
};
use tokio::task;

#[cfg(doc)]
use crate::Task;

/// Set of named [`Task`]s running on the current thread.
///
/// Resolves once every [`Task`] has finished, or as soon as any of them
/// stops with an error.
#[derive(Debug, Default)]
pub struct Background {
    /// Local set the [`Task`]s are spawned onto.
    set: task::LocalSet,

    /// Names and handles of the spawned [`Task`]s.
    tasks: Vec<(&'static str, task::JoinHandle<Result<(), Box<dyn Error>>>)>,
}

impl Background {
    /// Spawns the provided [`Task`] loop under the provided `name`.
    pub fn spawn<F, E>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), E>> + 'static,
        E: Error + 'static,
    {
        let handle =
            self.set.spawn_local(task.map_err(Box::<dyn Error>::from));
        self.tasks.push((name, handle));
    }
}

/// [`Task`] of a [`Background`] that has stopped abnormally.
#[derive(Debug, Display)]
#[display("`{task}` task stopped: {error}")]
pub struct Stopped {
    /// Name the [`Task`] has been spawned under.
    pub task: &'static str,

    /// Error the [`Task`] has stopped with.
    pub error: Box<dyn Error>,
}

impl Error for Stopped {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&*self.error)
    }
}

impl IntoFuture for Background {
    type Output = Result<(), Stopped>;
    type IntoFuture = LocalBoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let Self { set, tasks } = self;
        let tasks = tasks.into_iter().map(|(task, handle)| {
            handle
                .map(move |res| {
                    let error = match res {
                        Ok(Ok(())) => return Ok(()),
                        Ok(Err(e)) => e,
                        Err(e) => Box::<dyn Error>::from(e),
                    };
                    Err(Stopped { task, error })
                })
                .boxed_local()
        });
        let set = set.map(Ok).boxed_local();
        future::try_join_all(iter::once(set).chain(tasks))
            .map_ok(drop)
            .boxed_local()
    }
}

#[cfg(test)]
mod spec {
    use std::{future::IntoFuture as _, io};

    use super::Background;

    #[tokio::test]
    async fn completes_once_every_task_is_done() {
        let mut bg = Background::default();
        bg.spawn("first", async { Ok::<_, io::Error>(()) });
        bg.spawn("second", async { Ok::<_, io::Error>(()) });

        assert!(bg.into_future().await.is_ok());
    }

    #[tokio::test]
    async fn names_the_task_that_stopped() {
        let mut bg = Background::default();
        bg.spawn("healthy", async { Ok::<_, io::Error>(()) });
        bg.spawn("sweeper", async {
            Err(io::Error::other("database is gone"))
        });

        let err = bg.into_future().await.unwrap_err();

        assert_eq!(err.task, "sweeper");
        assert_eq!(
            err.to_string(),
            "`sweeper` task stopped: database is gone",
        );
    }
}

//! Structured races between futures and timers.

use std::future::Future;
use std::time::Duration;

use futures::future::{select, Either};

use crate::scheduler::Scheduler;

/// Result of racing a future against a timer.
#[derive(Debug)]
pub enum Raced<T, F> {
    /// The future finished first.
    Completed(T),
    /// The timer fired first; the future is handed back unfinished.
    TimedOut(F),
}

impl<T, F> Raced<T, F> {
    /// Whether the timer won.
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }
}

/// Race `future` against a `delay` timer. A future that is already ready
/// wins even with a zero delay.
pub fn race_timeout<F>(
    scheduler: &dyn Scheduler,
    future: F,
    delay: Duration,
) -> impl Future<Output = Raced<F::Output, F>>
where
    F: Future + Unpin,
{
    let timer = scheduler.sleep(delay);
    async move {
        match select(future, timer).await {
            Either::Left((output, _)) => Raced::Completed(output),
            Either::Right(((), future)) => Raced::TimedOut(future),
        }
    }
}

#[cfg(all(test, feature = "tokio"))]
mod tests {
    use super::*;
    use crate::scheduler::TokioScheduler;
    use futures::future::{FutureExt, LocalBoxFuture};

    fn delayed(scheduler: &TokioScheduler, ms: u64, value: u32) -> LocalBoxFuture<'static, u32> {
        let sleep = scheduler.sleep(Duration::from_millis(ms));
        async move {
            sleep.await;
            value
        }
        .boxed_local()
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_completes_before_timer() {
        let scheduler = TokioScheduler::new();
        let fut = delayed(&scheduler, 10, 7);

        match race_timeout(&scheduler, fut, Duration::from_millis(100)).await {
            Raced::Completed(v) => assert_eq!(v, 7),
            Raced::TimedOut(_) => panic!("expected completion"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_times_out_and_returns_future() {
        let scheduler = TokioScheduler::new();
        let fut = delayed(&scheduler, 100, 9);

        let raced = race_timeout(&scheduler, fut, Duration::from_millis(10)).await;
        assert!(raced.is_timed_out());
        assert_eq!(scheduler.now(), Duration::from_millis(10));

        if let Raced::TimedOut(rest) = raced {
            assert_eq!(rest.await, 9);
            assert_eq!(scheduler.now(), Duration::from_millis(100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_future_wins_zero_delay() {
        let scheduler = TokioScheduler::new();
        let ready = async { 1 }.boxed_local();

        let raced = race_timeout(&scheduler, ready, Duration::ZERO).await;
        assert!(matches!(raced, Raced::Completed(1)));
    }
}

//! Stream helpers shared by the feed and the session service.

mod throttle;
mod update_rate;

pub use throttle::{Throttle, ThrottleExt};
pub use update_rate::UpdateRate;

use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// Turn a latest-value watch channel into a rate-limited stream.
///
/// `WatchStream` yields the current value immediately; `None` means "no data
/// yet" and is skipped. The stream ends when the sender is dropped.
pub(crate) fn watch_updates<T>(
    rx: watch::Receiver<Option<Arc<T>>>,
    rate: UpdateRate,
    source_hz: f64,
) -> BoxStream<'static, Arc<T>>
where
    T: Send + Sync + 'static,
{
    let values = WatchStream::new(rx).filter_map(|opt| async move { opt });

    match rate.throttle_interval(source_hz) {
        None => values.boxed(),
        Some(interval) => values.throttle(interval).boxed(),
    }
}

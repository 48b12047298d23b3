use std::{future::Future, time::Duration};
pub use async_std::future::TimeoutError;

pub async fn timeout<F, T>(dur: Duration, f: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    async_std::future::timeout(dur, f).await
}

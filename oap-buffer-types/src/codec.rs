use crate::CodecErr;

/// Turns records into opaque bytes and back.
///
/// A codec is supplied when the buffer is constructed. Encoding happens on the producer's side,
/// before the record enters the writer; decoding happens on the reader's side, right before the
/// record is dispatched.
pub trait Codec: Send + Sync + 'static {
    type Record: Send + 'static;

    fn encode(&self, record: Self::Record) -> Result<Vec<u8>, CodecErr>;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Record, CodecErr>;
}

/// Passes bytes through untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawCodec;

/// UTF-8 text records.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringCodec;

impl Codec for RawCodec {
    type Record = Vec<u8>;

    #[inline]
    fn encode(&self, record: Vec<u8>) -> Result<Vec<u8>, CodecErr> {
        Ok(record)
    }

    #[inline]
    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecErr> {
        Ok(bytes.to_vec())
    }
}

impl Codec for StringCodec {
    type Record = String;

    fn encode(&self, record: String) -> Result<Vec<u8>, CodecErr> {
        Ok(record.into_bytes())
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, CodecErr> {
        Ok(std::str::from_utf8(bytes)?.to_owned())
    }
}

#[cfg(feature = "json")]
#[cfg_attr(docsrs, doc(cfg(feature = "json")))]
/// Records serialized as JSON documents.
pub struct JsonCodec<T> {
    record: std::marker::PhantomData<fn() -> T>,
}

#[cfg(feature = "json")]
impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            record: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "json")]
impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "json")]
impl<T> std::fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonCodec").finish()
    }
}

#[cfg(feature = "json")]
impl<T> Codec for JsonCodec<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned + Send + 'static,
{
    type Record = T;

    fn encode(&self, record: T) -> Result<Vec<u8>, CodecErr> {
        Ok(serde_json::to_vec(&record)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecErr> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{Deserialize, LEN_TYPE_SIZE, LenType};

/// The receiving end handle of the communication.
///
/// Frames are read into an internal word-aligned buffer that is reused
/// across calls, so a long-lived connection settles on one allocation.
pub struct WireReceiver<R: AsyncRead + Unpin> {
    rx: R,
    // u32 backing keeps every frame body 4-byte aligned for in-place casts.
    buf: Vec<u32>,
}

impl<R: AsyncRead + Unpin> WireReceiver<R> {
    /// Creates a new `WireReceiver` instance.
    ///
    /// # Arguments
    /// * `rx` - The underlying reader.
    pub(super) fn new(rx: R) -> Self {
        Self { rx, buf: Vec::new() }
    }

    /// Waits for the next frame and deserializes it.
    ///
    /// The returned `T` may borrow from the receiver's internal buffer and
    /// must be dropped before the next call.
    ///
    /// # Returns
    /// A result object that returns `T` on success or `io::Error` on failure.
    pub async fn recv<'buf, T: Deserialize<'buf>>(&'buf mut self) -> io::Result<T> {
        let mut size_buf = [0; LEN_TYPE_SIZE];
        self.rx.read_exact(&mut size_buf).await?;
        let len = LenType::from_be_bytes(size_buf) as usize;

        let words = len.div_ceil(size_of::<u32>());
        self.buf.clear();
        self.buf.resize(words, 0);

        let view: &mut [u8] = bytemuck::cast_slice_mut(self.buf.as_mut_slice());
        let body = &mut view[..len];
        self.rx.read_exact(body).await?;

        T::deserialize(body)
    }
}

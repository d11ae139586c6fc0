use std::io;

/// Deserialization contract for incoming messages.
///
/// The returned value may borrow from `buf`, which holds exactly one frame
/// body. The buffer always starts 4-byte aligned, so implementors can
/// reinterpret word-sized regions in place.
pub trait Deserialize<'a>: Sized {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self>;
}

/// Serialization contract for outgoing messages.
///
/// Implementors write their framed representation into `buf` and may return
/// an additional borrowed byte slice to be appended verbatim after it. The
/// split lets large payloads (contribution bytes, definition text) go out
/// without first copying them into the frame buffer.
pub trait Serialize<'a> {
    fn serialize(&'a self, buf: &mut Vec<u8>) -> Option<&'a [u8]>;
}

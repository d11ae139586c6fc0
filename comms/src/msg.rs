use std::{borrow::Cow, io, str};

use crate::{
    Deserialize, Serialize,
    specs::{FetchSpec, Rejection, SubmitSpec},
};

type Header = u32;
const HEADER_SIZE: usize = size_of::<Header>();

const ERR_H: Header = 0;
const CONTROL_H: Header = 1;
const DEFINITION_H: Header = 2;
const CONTRIBUTION_H: Header = 3;

/// The control-plane command for the `Control` variant of the `Msg` enum.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Client asks for a project's model definition.
    FetchDefinition(FetchSpec),
    /// Client announces a contribution; the payload follows in the next
    /// `Contribution` frame.
    Submit(SubmitSpec),
    /// Coordinator confirms a merged contribution.
    Accepted { id: String },
    Ping,
    Pong,
    Disconnect,
}

/// The application layer message for the entire system.
#[derive(Debug)]
pub enum Msg<'a> {
    Control(Command),
    /// A model definition in its serialized structured-text form.
    Definition(Cow<'a, str>),
    /// The encoded bytes of one parameter set.
    Contribution(&'a [u8]),
    Err(Rejection),
}

impl Msg<'_> {
    fn buf_is_too_small<T>(size: usize) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("The given buffer is too small {size}, must at least be {HEADER_SIZE} bytes"),
        ))
    }

    fn invalid_kind<T>(kind: Header) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Received an invalid frame kind {kind}"),
        ))
    }
}

impl<'a> Serialize<'a> for Msg<'a> {
    fn serialize(&'a self, buf: &mut Vec<u8>) -> Option<&'a [u8]> {
        match self {
            Msg::Err(rejection) => {
                buf.extend_from_slice(&ERR_H.to_be_bytes());

                // SAFETY: Serialize impl for `Rejection` is derived and has
                //         no non string-key map inside.
                serde_json::to_writer(buf, rejection).unwrap();
                None
            }
            Msg::Control(cmd) => {
                buf.extend_from_slice(&CONTROL_H.to_be_bytes());

                // SAFETY: Serialize impl for `Command` is derived and has no
                //         non string-key map inside.
                serde_json::to_writer(buf, cmd).unwrap();
                None
            }
            Msg::Definition(text) => {
                buf.extend_from_slice(&DEFINITION_H.to_be_bytes());
                Some(text.as_bytes())
            }
            Msg::Contribution(bytes) => {
                buf.extend_from_slice(&CONTRIBUTION_H.to_be_bytes());
                Some(bytes)
            }
        }
    }
}

impl<'a> Deserialize<'a> for Msg<'a> {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Self::buf_is_too_small(buf.len());
        }

        let (kind_buf, body) = buf.split_at(HEADER_SIZE);

        // SAFETY: We splitted the buffer to be of size `HEADER_SIZE` just above.
        let kind = Header::from_be_bytes(kind_buf.try_into().unwrap());

        match kind {
            ERR_H => {
                let rejection = serde_json::from_slice(body)?;
                Ok(Self::Err(rejection))
            }
            CONTROL_H => {
                let cmd = serde_json::from_slice(body)?;
                Ok(Self::Control(cmd))
            }
            DEFINITION_H => {
                let text = str::from_utf8(body)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

                Ok(Self::Definition(Cow::Borrowed(text)))
            }
            CONTRIBUTION_H => Ok(Self::Contribution(body)),
            kind => Self::invalid_kind(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specs::RejectKind;

    fn roundtrip(msg: &Msg<'_>) -> Vec<u8> {
        let mut buf = Vec::new();
        let tail = msg.serialize(&mut buf);

        if let Some(tail) = tail {
            buf.extend_from_slice(tail);
        }

        buf
    }

    #[test]
    fn control_frame_roundtrips() {
        let msg = Msg::Control(Command::Submit(SubmitSpec {
            token: "t".into(),
            project: "mnist".into(),
            id: "ab".repeat(20),
        }));

        let bytes = roundtrip(&msg);
        let Msg::Control(Command::Submit(spec)) = Msg::deserialize(&bytes).unwrap() else {
            panic!("wrong variant");
        };

        assert_eq!(spec.project, "mnist");
        assert_eq!(spec.id.len(), 40);
    }

    #[test]
    fn contribution_frame_is_byte_transparent() {
        let payload = [0_u8, 1, 2, 3, 255];
        let bytes = roundtrip(&Msg::Contribution(&payload));

        let Msg::Contribution(got) = Msg::deserialize(&bytes).unwrap() else {
            panic!("wrong variant");
        };

        assert_eq!(got, payload);
    }

    #[test]
    fn err_frame_keeps_kind_and_detail() {
        let msg = Msg::Err(Rejection::new(RejectKind::Unauthorized, "bad token"));
        let bytes = roundtrip(&msg);

        let Msg::Err(rejection) = Msg::deserialize(&bytes).unwrap() else {
            panic!("wrong variant");
        };

        assert_eq!(rejection.kind, RejectKind::Unauthorized);
        assert_eq!(rejection.detail, "bad token");
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let bytes = 9_u32.to_be_bytes();
        assert!(Msg::deserialize(&bytes).is_err());
    }
}

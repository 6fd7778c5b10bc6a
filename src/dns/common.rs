use bitstream_io::{BitWrite, BitWriter, Endianness};

use super::{ParseError, constants::MAX_POINTER_HOPS, name::Name};

pub trait PacketComponent: Sized {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError>;
    fn read(reader: &mut WireReader<'_>) -> Result<Self, ParseError>;

    /// Names are always written uncompressed
    fn write_name<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
        name: &Name,
    ) -> Result<(), ParseError> {
        for label in name.labels() {
            writer.write_var::<u8>(8, label.len() as u8)?;
            writer.write_bytes(label)?;
        }
        writer.write_var::<u8>(8, 0)?;
        Ok(())
    }
}

/// Byte cursor over a whole DNS message.
///
/// A reader may be limited to a window (one RDATA) while name decompression
/// still resolves pointers against the full message buffer.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            end: buf.len(),
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.end
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        if self.remaining() < len {
            return Err(ParseError::Truncated);
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn take_rest(&mut self) -> &'a [u8] {
        let bytes = &self.buf[self.pos..self.end];
        self.pos = self.end;
        bytes
    }

    pub fn read_u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ParseError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, ParseError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Split off a reader for the next `len` bytes and skip past them.
    pub fn sub_reader(&mut self, len: usize) -> Result<WireReader<'a>, ParseError> {
        if self.remaining() < len {
            return Err(ParseError::Truncated);
        }
        let window = WireReader {
            buf: self.buf,
            pos: self.pos,
            end: self.pos + len,
        };
        self.pos += len;
        Ok(window)
    }

    /// Read a possibly compressed domain name (RFC 1035 §4.1.4).
    pub fn read_name(&mut self) -> Result<Name, ParseError> {
        let mut labels: Vec<&[u8]> = Vec::new();
        let mut pos = self.pos;
        let mut limit = self.end;
        let mut jumped = false;
        let mut hops = 0;

        loop {
            if pos >= limit {
                return Err(ParseError::Truncated);
            }
            let len = self.buf[pos];
            match len & 0xC0 {
                0x00 => {
                    pos += 1;
                    if len == 0 {
                        break;
                    }
                    let label_end = pos + len as usize;
                    if label_end > limit {
                        return Err(ParseError::Truncated);
                    }
                    labels.push(&self.buf[pos..label_end]);
                    pos = label_end;
                }
                0xC0 => {
                    if pos + 1 >= limit {
                        return Err(ParseError::Truncated);
                    }
                    hops += 1;
                    if hops > MAX_POINTER_HOPS {
                        return Err(ParseError::CompressionLoop);
                    }
                    let target = (((len & 0x3F) as usize) << 8) | self.buf[pos + 1] as usize;
                    if !jumped {
                        self.pos = pos + 2;
                        jumped = true;
                    }
                    pos = target;
                    limit = self.buf.len();
                }
                _ => return Err(ParseError::InvalidLabel),
            }
        }

        if !jumped {
            self.pos = pos;
        }
        Name::from_labels(labels)
    }
}

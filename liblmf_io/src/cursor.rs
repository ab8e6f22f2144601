use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, SeekFrom, Write};

/// Anything an input session can decode from
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// Anything an output session can encode into
pub trait WriteSeek: Write + Seek {}
impl<T: Write + Seek> WriteSeek for T {}

macro_rules! read_primitive {
    ($name:ident, $ty:ty, $size:expr, $call:expr) => {
        pub fn $name(&mut self) -> std::io::Result<$ty> {
            let result = $call(&mut self.inner);
            self.track(result, $size)
        }
    };
}

macro_rules! write_primitive {
    ($name:ident, $ty:ty, $size:expr, $call:expr) => {
        pub fn $name(&mut self, value: $ty) -> std::io::Result<()> {
            let result = $call(&mut self.inner, value);
            self.track(result, $size)
        }
    };
}

/// A seekable little-endian byte stream with sticky error and end-of-file flags.
///
/// Every primitive returns a `std::io::Result`, and a failure additionally latches the
/// `error` flag (and the `eof` flag when the storage ran out). The flags stay set until a
/// successful [`ByteCursor::seek`] or an explicit [`ByteCursor::reset_flags`], so a caller
/// may run a block of reads and inspect the flags once afterwards.
#[derive(Debug)]
pub struct ByteCursor<T> {
    inner: T,
    position: u64,
    error: bool,
    eof: bool,
}

impl<T> ByteCursor<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            position: 0,
            error: false,
            eof: false,
        }
    }

    /// Absolute byte offset of the next read/write
    pub fn tell(&self) -> u64 {
        self.position
    }

    pub fn error(&self) -> bool {
        self.error
    }

    pub fn eof(&self) -> bool {
        self.eof
    }

    pub fn reset_flags(&mut self) {
        self.error = false;
        self.eof = false;
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    fn latch(&mut self, err: &std::io::Error) {
        self.error = true;
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            self.eof = true;
        }
    }
}

impl<T: Seek> ByteCursor<T> {
    /// Move to an absolute offset. Success clears the sticky flags.
    pub fn seek(&mut self, offset: u64) -> std::io::Result<()> {
        match self.inner.seek(SeekFrom::Start(offset)) {
            Ok(pos) => {
                self.position = pos;
                self.reset_flags();
                Ok(())
            }
            Err(e) => {
                self.latch(&e);
                Err(e)
            }
        }
    }

    /// Move past the last byte of the storage
    pub fn seek_to_end(&mut self) -> std::io::Result<u64> {
        match self.inner.seek(SeekFrom::End(0)) {
            Ok(pos) => {
                self.position = pos;
                self.reset_flags();
                Ok(pos)
            }
            Err(e) => {
                self.latch(&e);
                Err(e)
            }
        }
    }

    fn track<V>(&mut self, result: std::io::Result<V>, size: u64) -> std::io::Result<V> {
        match result {
            Ok(v) => {
                self.position += size;
                Ok(v)
            }
            Err(e) => {
                self.latch(&e);
                // A short read may have consumed part of the value
                if let Ok(pos) = self.inner.stream_position() {
                    self.position = pos;
                }
                Err(e)
            }
        }
    }
}

impl<T: Read + Seek> ByteCursor<T> {
    read_primitive!(read_u8, u8, 1, |r: &mut T| r.read_u8());
    read_primitive!(read_i8, i8, 1, |r: &mut T| r.read_i8());
    read_primitive!(read_u16, u16, 2, |r: &mut T| r.read_u16::<LittleEndian>());
    read_primitive!(read_i16, i16, 2, |r: &mut T| r.read_i16::<LittleEndian>());
    read_primitive!(read_u32, u32, 4, |r: &mut T| r.read_u32::<LittleEndian>());
    read_primitive!(read_i32, i32, 4, |r: &mut T| r.read_i32::<LittleEndian>());
    read_primitive!(read_u64, u64, 8, |r: &mut T| r.read_u64::<LittleEndian>());
    read_primitive!(read_i64, i64, 8, |r: &mut T| r.read_i64::<LittleEndian>());
    read_primitive!(read_f32, f32, 4, |r: &mut T| r.read_f32::<LittleEndian>());
    read_primitive!(read_f64, f64, 8, |r: &mut T| r.read_f64::<LittleEndian>());

    /// Fill the whole buffer from the stream
    pub fn read_bytes(&mut self, buffer: &mut [u8]) -> std::io::Result<()> {
        let result = self.inner.read_exact(buffer);
        self.track(result, buffer.len() as u64)
    }

    /// Read `len` bytes into a new buffer, growing it only as data actually arrives
    pub fn read_vec(&mut self, len: u64) -> std::io::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let result = (&mut self.inner).take(len).read_to_end(&mut buffer);
        let result = match result {
            Ok(n) if (n as u64) < len => {
                Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof))
            }
            other => other,
        };
        self.track(result, len).map(|_| buffer)
    }

    /// Read a u32 or a u64 depending on the archive era
    pub fn read_size(&mut self, wide: bool) -> std::io::Result<u64> {
        if wide {
            self.read_u64()
        } else {
            self.read_u32().map(u64::from)
        }
    }

    /// Read the first `N` bytes of a record, telling a clean end of storage apart from a
    /// truncated record.
    ///
    /// Returns `Ok(None)` (and latches `eof`) when not a single byte was left.
    pub fn read_leading<const N: usize>(&mut self) -> std::io::Result<Option<[u8; N]>> {
        let mut buffer = [0u8; N];
        let mut filled = 0;
        while filled < N {
            match self.inner.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.position += filled as u64;
                    self.latch(&e);
                    return Err(e);
                }
            }
        }
        self.position += filled as u64;
        if filled == 0 {
            self.error = true;
            self.eof = true;
            return Ok(None);
        }
        if filled < N {
            let e = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
            self.latch(&e);
            return Err(e);
        }
        Ok(Some(buffer))
    }

    /// Skip forward over `count` bytes without interpreting them
    pub fn skip(&mut self, count: u64) -> std::io::Result<()> {
        let target = self.position + count;
        self.seek(target)
    }
}

impl<T: Write + Seek> ByteCursor<T> {
    write_primitive!(write_u8, u8, 1, |w: &mut T, v| w.write_u8(v));
    write_primitive!(write_i8, i8, 1, |w: &mut T, v| w.write_i8(v));
    write_primitive!(write_u16, u16, 2, |w: &mut T, v| w
        .write_u16::<LittleEndian>(v));
    write_primitive!(write_i16, i16, 2, |w: &mut T, v| w
        .write_i16::<LittleEndian>(v));
    write_primitive!(write_u32, u32, 4, |w: &mut T, v| w
        .write_u32::<LittleEndian>(v));
    write_primitive!(write_i32, i32, 4, |w: &mut T, v| w
        .write_i32::<LittleEndian>(v));
    write_primitive!(write_u64, u64, 8, |w: &mut T, v| w
        .write_u64::<LittleEndian>(v));
    write_primitive!(write_i64, i64, 8, |w: &mut T, v| w
        .write_i64::<LittleEndian>(v));
    write_primitive!(write_f32, f32, 4, |w: &mut T, v| w
        .write_f32::<LittleEndian>(v));
    write_primitive!(write_f64, f64, 8, |w: &mut T, v| w
        .write_f64::<LittleEndian>(v));

    pub fn write_bytes(&mut self, buffer: &[u8]) -> std::io::Result<()> {
        let result = self.inner.write_all(buffer);
        self.track(result, buffer.len() as u64)
    }

    /// Write a u32 or a u64 depending on the archive era
    pub fn write_size(&mut self, value: u64, wide: bool) -> std::io::Result<()> {
        if wide {
            self.write_u64(value)
        } else {
            self.write_u32(value as u32)
        }
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        let result = self.inner.flush();
        self.track(result, 0)
    }
}

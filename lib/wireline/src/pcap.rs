//! Classic PCAP capture files: a writer that fabricates one UDP frame per
//! record, and a reader that can rewrite the record it just returned.
//!
//! File headers are little-endian; each record carries exactly one
//! Ethernet/IPv4/UDP frame built by [`crate::ether`].

use crate::ether::{self, EndpointAddr, FRAME_OVERHEAD};
use crate::{WireError, WireResult};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

pub const MAGIC: u32 = 0xa1b2_c3d4;
pub const MAGIC_SWAPPED: u32 = 0xd4c3_b2a1;
pub const VER_MAJOR: u16 = 2;
pub const VER_MINOR: u16 = 4;
pub const SNAP_LEN: u32 = 65_535;
pub const LINKTYPE_ETHERNET: u32 = 1;

pub const GLOBAL_HDR_LEN: usize = 24;
pub const RECORD_HDR_LEN: usize = 16;

#[derive(Debug, Clone, Copy)]
struct RecordHdr {
    ts_sec: u32,
    ts_usec: u32,
    incl_len: u32,
    orig_len: u32,
}

impl RecordHdr {
    fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_u32::<LittleEndian>(self.ts_sec)?;
        out.write_u32::<LittleEndian>(self.ts_usec)?;
        out.write_u32::<LittleEndian>(self.incl_len)?;
        out.write_u32::<LittleEndian>(self.orig_len)?;
        Ok(())
    }

    fn read(buf: &[u8; RECORD_HDR_LEN]) -> RecordHdr {
        RecordHdr {
            ts_sec: LittleEndian::read_u32(&buf[0..4]),
            ts_usec: LittleEndian::read_u32(&buf[4..8]),
            incl_len: LittleEndian::read_u32(&buf[8..12]),
            orig_len: LittleEndian::read_u32(&buf[12..16]),
        }
    }
}

/// Writes a capture of fabricated UDP frames between two fixed endpoints.
pub struct PcapWriter {
    out: BufWriter<File>,
    dst: EndpointAddr,
    src: EndpointAddr,
    records: u64,
}

impl PcapWriter {
    /// Creates `path` (truncating) and writes the global capture header.
    pub fn create<P: AsRef<Path>>(
        path: P,
        dst: EndpointAddr,
        src: EndpointAddr,
    ) -> WireResult<PcapWriter> {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);

        out.write_u32::<LittleEndian>(MAGIC)?;
        out.write_u16::<LittleEndian>(VER_MAJOR)?;
        out.write_u16::<LittleEndian>(VER_MINOR)?;
        out.write_i32::<LittleEndian>(0)?; // thiszone
        out.write_u32::<LittleEndian>(0)?; // sigfigs
        out.write_u32::<LittleEndian>(SNAP_LEN)?;
        out.write_u32::<LittleEndian>(LINKTYPE_ETHERNET)?;

        Ok(PcapWriter {
            out,
            dst,
            src,
            records: 0,
        })
    }

    /// Appends one record holding `payload` wrapped in a freshly built frame.
    pub fn add_record(&mut self, ts_sec: u32, ts_usec: u32, payload: &[u8]) -> WireResult<()> {
        let frame = ether::build_udp_frame(&self.dst, &self.src, payload);
        let hdr = RecordHdr {
            ts_sec,
            ts_usec,
            incl_len: frame.len() as u32,
            orig_len: frame.len() as u32,
        };
        hdr.write(&mut self.out)?;
        self.out.write_all(&frame)?;
        self.records += 1;
        Ok(())
    }

    /// Records written so far.
    #[inline]
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Flushes and closes the capture.
    pub fn finish(mut self) -> WireResult<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// One record as returned by [`PcapReader::read_record`].
#[derive(Debug, Clone)]
pub struct Record {
    pub ts_sec: u32,
    pub ts_usec: u32,
    pub payload: Vec<u8>,
    pub dst: EndpointAddr,
    pub src: EndpointAddr,
}

#[derive(Debug)]
struct LastRecord {
    offset: u64,
    hdr: RecordHdr,
    dst: EndpointAddr,
    src: EndpointAddr,
}

/// Streams records out of a capture; in editable mode the most recently read
/// record can be rewritten in place with fresh checksums.
#[derive(Debug)]
pub struct PcapReader {
    file: File,
    editable: bool,
    last: Option<LastRecord>,
}

impl PcapReader {
    pub fn open<P: AsRef<Path>>(path: P, editable: bool) -> WireResult<PcapReader> {
        let mut file = OpenOptions::new().read(true).write(editable).open(path)?;

        let mut hdr = [0u8; GLOBAL_HDR_LEN];
        if !read_or_eof(&mut file, &mut hdr)? {
            return Err(WireError::Truncated);
        }

        let magic = LittleEndian::read_u32(&hdr[0..4]);
        if magic != MAGIC {
            return Err(WireError::BadMagic(magic));
        }
        let network = LittleEndian::read_u32(&hdr[20..24]);
        if network != LINKTYPE_ETHERNET {
            return Err(WireError::UnsupportedLayer("link type"));
        }

        Ok(PcapReader {
            file,
            editable,
            last: None,
        })
    }

    /// Reads the next record. `Eof` on a clean record boundary is the normal
    /// terminator.
    pub fn read_record(&mut self) -> WireResult<Record> {
        let offset = self.file.seek(SeekFrom::Current(0))?;

        let mut hdr_buf = [0u8; RECORD_HDR_LEN];
        if !read_or_eof(&mut self.file, &mut hdr_buf)? {
            return Err(WireError::Eof);
        }
        let hdr = RecordHdr::read(&hdr_buf);

        if (hdr.incl_len as usize) < FRAME_OVERHEAD || hdr.incl_len > SNAP_LEN {
            return Err(WireError::Truncated);
        }

        let mut frame = vec![0u8; hdr.incl_len as usize];
        if !read_or_eof(&mut self.file, &mut frame)? {
            return Err(WireError::Truncated);
        }

        let parsed = ether::parse_udp_frame(&frame)?;
        let payload = parsed.payload(&frame).to_vec();

        self.last = Some(LastRecord {
            offset,
            hdr,
            dst: parsed.dst,
            src: parsed.src,
        });

        Ok(Record {
            ts_sec: hdr.ts_sec,
            ts_usec: hdr.ts_usec,
            payload,
            dst: parsed.dst,
            src: parsed.src,
        })
    }

    /// Rewrites the record returned by the last `read_record` with a new
    /// payload of identical length, recomputing the UDP and IPv4 checksums.
    /// `retime` replaces the record header timestamp when given.
    pub fn replace_last_record(
        &mut self,
        payload: &[u8],
        retime: Option<(u32, u32)>,
    ) -> WireResult<()> {
        if !self.editable {
            return Err(WireError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "capture not opened for editing",
            )));
        }
        let last = self.last.as_ref().ok_or(WireError::NoRecord)?;

        let expected = last.hdr.incl_len as usize - FRAME_OVERHEAD;
        if payload.len() != expected {
            return Err(WireError::PayloadMismatch {
                expected,
                got: payload.len(),
            });
        }

        let frame = ether::build_udp_frame(&last.dst, &last.src, payload);
        let mut hdr = last.hdr;
        if let Some((ts_sec, ts_usec)) = retime {
            hdr.ts_sec = ts_sec;
            hdr.ts_usec = ts_usec;
        }

        let resume = self.file.seek(SeekFrom::Current(0))?;
        self.file.seek(SeekFrom::Start(last.offset))?;
        let mut buf = Vec::with_capacity(RECORD_HDR_LEN + frame.len());
        hdr.write(&mut buf)?;
        buf.extend_from_slice(&frame);
        self.file.write_all(&buf)?;
        self.file.seek(SeekFrom::Start(resume))?;
        Ok(())
    }
}

/// Fills `buf` completely. Returns false on end-of-file at the first byte;
/// end-of-file anywhere later is a truncation error.
fn read_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> WireResult<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(WireError::Truncated),
            Ok(n) => filled += n,
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::path::PathBuf;

    fn endpoints() -> (EndpointAddr, EndpointAddr) {
        (
            EndpointAddr {
                mac: [0x02, 0, 0, 0, 0, 0x11],
                ip: Ipv4Addr::new(172, 16, 0, 1),
                port: 5001,
            },
            EndpointAddr {
                mac: [0x02, 0, 0, 0, 0, 0x22],
                ip: Ipv4Addr::new(172, 16, 0, 2),
                port: 5002,
            },
        )
    }

    fn temp_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("wireline-{}-{}.pcap", name, std::process::id()));
        path
    }

    #[test]
    fn write_read_roundtrip() {
        let path = temp_path("roundtrip");
        let (dst, src) = endpoints();

        let mut writer = PcapWriter::create(&path, dst, src).unwrap();
        let payloads: Vec<Vec<u8>> = (0..5u8).map(|i| vec![i; 20 + i as usize]).collect();
        for (i, payload) in payloads.iter().enumerate() {
            writer.add_record(i as u32, i as u32 * 10 + 3, payload).unwrap();
        }
        assert_eq!(writer.records(), 5);
        writer.finish().unwrap();

        let mut reader = PcapReader::open(&path, false).unwrap();
        for (i, payload) in payloads.iter().enumerate() {
            let record = reader.read_record().unwrap();
            assert_eq!(record.ts_sec, i as u32);
            assert_eq!(record.ts_usec, i as u32 * 10 + 3);
            assert_eq!(&record.payload, payload);
            assert_eq!(record.dst, dst);
            assert_eq!(record.src, src);
        }
        match reader.read_record() {
            Err(WireError::Eof) => {}
            other => panic!("expected eof, got {:?}", other),
        }

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn replace_rewrites_in_place_with_valid_checksums() {
        let path = temp_path("replace");
        let (dst, src) = endpoints();

        let mut writer = PcapWriter::create(&path, dst, src).unwrap();
        writer.add_record(1, 1, b"first record").unwrap();
        writer.add_record(2, 2, b"second rec..").unwrap();
        writer.finish().unwrap();

        let mut reader = PcapReader::open(&path, true).unwrap();
        let _ = reader.read_record().unwrap();
        let second = reader.read_record().unwrap();
        assert_eq!(&second.payload, b"second rec..");
        reader
            .replace_last_record(b"second fixed", Some((7, 8)))
            .unwrap();
        match reader.read_record() {
            Err(WireError::Eof) => {}
            other => panic!("expected eof, got {:?}", other),
        }
        drop(reader);

        let mut reader = PcapReader::open(&path, false).unwrap();
        let first = reader.read_record().unwrap();
        assert_eq!(&first.payload, b"first record");
        let second = reader.read_record().unwrap();
        assert_eq!(&second.payload, b"second fixed");
        assert_eq!((second.ts_sec, second.ts_usec), (7, 8));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn replace_rejects_length_changes() {
        let path = temp_path("replace-len");
        let (dst, src) = endpoints();

        let mut writer = PcapWriter::create(&path, dst, src).unwrap();
        writer.add_record(0, 0, b"abcdef").unwrap();
        writer.finish().unwrap();

        let mut reader = PcapReader::open(&path, true).unwrap();
        let _ = reader.read_record().unwrap();
        match reader.replace_last_record(b"abc", None) {
            Err(WireError::PayloadMismatch { expected: 6, got: 3 }) => {}
            other => panic!("unexpected result: {:?}", other),
        }

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn replace_requires_a_read_record() {
        let path = temp_path("replace-none");
        let (dst, src) = endpoints();

        let mut writer = PcapWriter::create(&path, dst, src).unwrap();
        writer.add_record(0, 0, b"abcdef").unwrap();
        writer.finish().unwrap();

        let mut reader = PcapReader::open(&path, true).unwrap();
        match reader.replace_last_record(b"abcdef", None) {
            Err(WireError::NoRecord) => {}
            other => panic!("unexpected result: {:?}", other),
        }

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn truncated_record_is_an_error() {
        let path = temp_path("truncated");
        let (dst, src) = endpoints();

        let mut writer = PcapWriter::create(&path, dst, src).unwrap();
        writer.add_record(0, 0, b"whole record").unwrap();
        writer.finish().unwrap();

        let len = std::fs::metadata(&path).unwrap().len();
        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 4).unwrap();
        drop(file);

        let mut reader = PcapReader::open(&path, false).unwrap();
        match reader.read_record() {
            Err(WireError::Truncated) => {}
            other => panic!("unexpected result: {:?}", other),
        }

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn rejects_foreign_magic() {
        let path = temp_path("magic");
        std::fs::write(&path, &[0u8; GLOBAL_HDR_LEN]).unwrap();
        match PcapReader::open(&path, false) {
            Err(WireError::BadMagic(0)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        std::fs::remove_file(&path).unwrap();
    }
}

//! Binary ZIP code database.
//!
//! mmap'd binary search on us_zipcodes.bin.
//! Entry format: 5 bytes ASCII ZIP + 4 bytes f32 lat + 4 bytes f32 lon.
//! File header: 4 bytes u32 count (little-endian). Entries sorted by ZIP.

use std::fs::{self, File};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use crate::geo::GeoCoordinate;
use crate::zipcode::ZipLocation;

const ENTRY_SIZE: usize = 13; // 5 + 4 + 4
const HEADER_SIZE: usize = 4; // u32 count

/// Read-only mapping of the whole file, unmapped on drop
struct Mapped {
    ptr: *mut libc::c_void,
    len: usize,
}

impl Mapped {
    fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len() as usize;
        if len < HEADER_SIZE {
            let err = io::Error::new(io::ErrorKind::InvalidData, "zip database truncated");
            return Err(err);
        }

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ,
                libc::MAP_PRIVATE,
                file.as_raw_fd(),
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { ptr, len })
    }

    fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr as *const u8, self.len) }
    }

    /// Entry count, clamped to what the file actually holds
    fn count(&self) -> usize {
        let data = self.bytes();
        let declared = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        declared.min((self.len - HEADER_SIZE) / ENTRY_SIZE)
    }

    fn entry(&self, index: usize) -> (&[u8], GeoCoordinate) {
        let data = self.bytes();
        let offset = HEADER_SIZE + index * ENTRY_SIZE;
        let f = |at: usize| {
            f32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]) as f64
        };
        let coordinate = GeoCoordinate {
            latitude: f(offset + 5),
            longitude: f(offset + 9),
        };
        (&data[offset..offset + 5], coordinate)
    }
}

impl Drop for Mapped {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr, self.len);
        }
    }
}

/// Left-pad to exactly 5 ASCII digits ("601" -> "00601")
fn zip5(zipcode: &str) -> [u8; 5] {
    let mut zip5 = [b'0'; 5];
    let bytes = zipcode.as_bytes();
    let len = bytes.len().min(5);
    zip5[5 - len..].copy_from_slice(&bytes[..len]);
    zip5
}

pub fn lookup(db_path: &Path, zipcode: &str) -> io::Result<Option<GeoCoordinate>> {
    let key = zip5(zipcode);
    let map = Mapped::open(db_path)?;
    let count = map.count();

    let (mut low, mut high) = (0usize, count);
    while low < high {
        let mid = low + (high - low) / 2;
        let (entry_zip, coordinate) = map.entry(mid);
        match entry_zip.cmp(&key[..]) {
            std::cmp::Ordering::Equal => return Ok(Some(coordinate)),
            std::cmp::Ordering::Less => low = mid + 1,
            std::cmp::Ordering::Greater => high = mid,
        }
    }
    Ok(None)
}

/// Every entry in file order
pub fn scan(db_path: &Path) -> io::Result<Vec<ZipLocation>> {
    let map = Mapped::open(db_path)?;
    let count = map.count();
    let mut out = Vec::with_capacity(count);

    for i in 0..count {
        let (zip, coordinate) = map.entry(i);
        let Ok(zip) = std::str::from_utf8(zip) else {
            continue;
        };
        out.push(ZipLocation {
            zip: zip.to_string(),
            coordinate,
            city: None,
            state: None,
        });
    }
    Ok(out)
}

/// Write a database from arbitrary locations. Sorts and drops duplicate ZIPs
/// (first one wins). Returns the number of entries written.
pub fn write(db_path: &Path, locations: &[ZipLocation]) -> io::Result<usize> {
    let mut rows: Vec<([u8; 5], GeoCoordinate)> = locations
        .iter()
        .map(|loc| (zip5(&loc.zip), loc.coordinate))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows.dedup_by(|a, b| a.0 == b.0);

    let mut buf = Vec::with_capacity(HEADER_SIZE + rows.len() * ENTRY_SIZE);
    buf.extend_from_slice(&(rows.len() as u32).to_le_bytes());
    for (zip, c) in &rows {
        buf.extend_from_slice(zip);
        buf.extend_from_slice(&(c.latitude as f32).to_le_bytes());
        buf.extend_from_slice(&(c.longitude as f32).to_le_bytes());
    }
    fs::write(db_path, buf)?;
    Ok(rows.len())
}

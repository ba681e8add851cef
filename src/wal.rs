use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Write one record: `[u32 len][bincode payload][u32 crc32]`, little-endian.
fn write_record(out: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload = bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "event too large for WAL record"))?;
    out.write_all(&len.to_le_bytes())?;
    out.write_all(&payload)?;
    out.write_all(&crc32fast::hash(&payload).to_le_bytes())
}

/// Fill `buf` completely. `Ok(false)` means the file ended first.
fn read_full(input: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match input.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Next intact record, or `None` at the end of the log. A torn tail, a CRC
/// mismatch or an undecodable payload all end the log there.
fn read_record(input: &mut impl Read) -> io::Result<Option<Event>> {
    let mut word = [0u8; 4];
    if !read_full(input, &mut word)? {
        return Ok(None);
    }
    let mut payload = vec![0u8; u32::from_le_bytes(word) as usize];
    if !read_full(input, &mut payload)? || !read_full(input, &mut word)? {
        return Ok(None);
    }
    if u32::from_le_bytes(word) != crc32fast::hash(&payload) {
        return Ok(None);
    }
    Ok(bincode::deserialize(&payload).ok())
}

/// Append-only event log for the booking store.
///
/// Writes are buffered; `flush_sync` makes everything appended so far durable.
/// Compaction writes a snapshot of events to a sibling file and renames it over
/// the log.
pub struct Wal {
    out: BufWriter<File>,
    path: PathBuf,
    appended: u64,
}

fn open_append(path: &Path) -> io::Result<BufWriter<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

fn snapshot_path(path: &Path) -> PathBuf {
    path.with_extension("wal.compact")
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            out: open_append(path)?,
            path: path.to_path_buf(),
            appended: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Buffer one event. Not durable until `flush_sync`.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        write_record(&mut self.out, event)?;
        self.appended += 1;
        Ok(())
    }

    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.out.flush()?;
        self.out.get_ref().sync_all()
    }

    /// Records appended since open or the last compaction.
    pub fn appends_since_compact(&self) -> u64 {
        self.appended
    }

    /// Write `events` to the snapshot file next to `path` and fsync it.
    pub fn write_snapshot(path: &Path, events: &[Event]) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(snapshot_path(path))?);
        for event in events {
            write_record(&mut out, event)?;
        }
        out.flush()?;
        out.get_ref().sync_all()
    }

    /// Rename the snapshot over the log and continue appending to it.
    pub fn install_snapshot(&mut self) -> io::Result<()> {
        fs::rename(snapshot_path(&self.path), &self.path)?;
        self.out = open_append(&self.path)?;
        self.appended = 0;
        Ok(())
    }

    /// Every intact event in the log, oldest first. A missing file is an empty log.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        let mut input = match File::open(path) {
            Ok(f) => BufReader::new(f),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut events = Vec::new();
        while let Some(event) = read_record(&mut input)? {
            events.push(event);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("farmstay_wal_tests");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = fs::remove_file(&path);
        path
    }

    fn farm_created(title: &str) -> Event {
        Event::FarmCreated {
            id: Ulid::new(),
            title: title.into(),
            location: "Coorg".into(),
            nightly_rate: 3500,
            capacity: 4,
        }
    }

    fn write_all(path: &Path, events: &[Event]) {
        let mut wal = Wal::open(path).unwrap();
        for e in events {
            wal.append_buffered(e).unwrap();
        }
        wal.flush_sync().unwrap();
    }

    #[test]
    fn replays_in_append_order() {
        let path = scratch("order.wal");
        let farm = farm_created("Coffee Estate");
        let events = vec![
            farm.clone(),
            Event::ReservationCancelled {
                id: Ulid::new(),
                farm_id: farm.farm_id(),
            },
            Event::FarmDeleted { id: farm.farm_id() },
        ];
        write_all(&path, &events);
        assert_eq!(Wal::replay(&path).unwrap(), events);
    }

    #[test]
    fn missing_log_is_empty() {
        let path = scratch("missing.wal");
        assert!(Wal::replay(&path).unwrap().is_empty());
    }

    #[test]
    fn torn_tail_is_dropped() {
        let path = scratch("torn.wal");
        let event = farm_created("Tea Garden");
        write_all(&path, std::slice::from_ref(&event));
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            // Length prefix promising 200 bytes, then only a few.
            f.write_all(&200u32.to_le_bytes()).unwrap();
            f.write_all(&[1, 2, 3]).unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap(), vec![event]);
    }

    #[test]
    fn bad_checksum_ends_replay() {
        let path = scratch("crc.wal");
        let good = farm_created("Spice Farm");
        write_all(&path, std::slice::from_ref(&good));
        {
            let payload = bincode::serialize(&farm_created("Lost")).unwrap();
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&0xBADC_0FFEu32.to_le_bytes()).unwrap();
        }
        write_all(&path, &[farm_created("After corruption")]);
        assert_eq!(Wal::replay(&path).unwrap(), vec![good]);
    }

    #[test]
    fn snapshot_replaces_history_and_appends_continue() {
        let path = scratch("snapshot.wal");
        let farm = farm_created("Apple Orchard");
        let churn: Vec<Event> = (0..20)
            .map(|_| Event::ReservationCancelled {
                id: Ulid::new(),
                farm_id: farm.farm_id(),
            })
            .collect();
        let mut wal = Wal::open(&path).unwrap();
        wal.append_buffered(&farm).unwrap();
        for e in &churn {
            wal.append_buffered(e).unwrap();
        }
        wal.flush_sync().unwrap();
        assert_eq!(wal.appends_since_compact(), 21);
        let before = fs::metadata(&path).unwrap().len();

        Wal::write_snapshot(&path, std::slice::from_ref(&farm)).unwrap();
        wal.install_snapshot().unwrap();
        assert_eq!(wal.appends_since_compact(), 0);
        assert!(fs::metadata(&path).unwrap().len() < before);

        let later = Event::FarmDeleted { id: farm.farm_id() };
        wal.append_buffered(&later).unwrap();
        wal.flush_sync().unwrap();
        assert_eq!(Wal::replay(&path).unwrap(), vec![farm, later]);
    }

    #[test]
    fn unflushed_records_are_not_visible_on_disk() {
        let path = scratch("buffered.wal");
        let mut wal = Wal::open(&path).unwrap();
        wal.append_buffered(&farm_created("Rice Paddy")).unwrap();
        // Small records stay in the BufWriter until flushed.
        assert!(Wal::replay(&path).unwrap().is_empty());
        wal.flush_sync().unwrap();
        assert_eq!(Wal::replay(&path).unwrap().len(), 1);
    }
}

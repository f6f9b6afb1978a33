//! Per-round records and the append-only stores that receive them.
//!
//! Two independent stores accept records each round: a census store with
//! `(round, n_alive)` pairs and a snapshot store with full positional
//! snapshots. Both are written as consecutive MessagePack values so a round
//! is appended without rewriting what came before.

use crate::geometry::Point;
use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

/// Live count of the flock after a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CensusRecord {
    pub round: u32,
    pub n_alive: usize,
}

/// Full positional snapshot after a round.
///
/// `sheep_pos` is indexed like the flock; captured sheep are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub round: u32,
    pub wolf_pos: Point,
    pub sheep_pos: Vec<Option<Point>>,
}

/// Append-only sink for [`CensusRecord`]s.
pub trait CensusStore {
    fn append(&mut self, record: &CensusRecord) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

/// Append-only sink for [`RoundSnapshot`]s.
pub trait SnapshotStore {
    fn append(&mut self, snapshot: &RoundSnapshot) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

/// [`CensusStore`] writing MessagePack frames to an underlying writer.
pub struct MsgpackCensusStore<W: Write> {
    writer: W,
}

impl MsgpackCensusStore<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> MsgpackCensusStore<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> CensusStore for MsgpackCensusStore<W> {
    fn append(&mut self, record: &CensusRecord) -> Result<()> {
        encode::write(&mut self.writer, record).context("failed to serialize census record")
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("failed to flush census store")
    }
}

/// [`SnapshotStore`] writing MessagePack frames to an underlying writer.
pub struct MsgpackSnapshotStore<W: Write> {
    writer: W,
}

impl MsgpackSnapshotStore<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> MsgpackSnapshotStore<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> SnapshotStore for MsgpackSnapshotStore<W> {
    fn append(&mut self, snapshot: &RoundSnapshot) -> Result<()> {
        encode::write(&mut self.writer, snapshot).context("failed to serialize snapshot")
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("failed to flush snapshot store")
    }
}

/// Read all [`CensusRecord`] frames from a file.
pub fn read_census_file<P: AsRef<Path>>(file: P) -> Result<Vec<CensusRecord>> {
    let file = file.as_ref();
    let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    read_frames(BufReader::new(file))
}

/// Read all [`RoundSnapshot`] frames from a file.
pub fn read_snapshot_file<P: AsRef<Path>>(file: P) -> Result<Vec<RoundSnapshot>> {
    let file = file.as_ref();
    let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    read_frames(BufReader::new(file))
}

fn read_frames<T, R>(mut reader: R) -> Result<Vec<T>>
where
    T: serde::de::DeserializeOwned,
    R: Read,
{
    let mut frames = Vec::new();
    loop {
        match decode::from_read(&mut reader) {
            Ok(frame) => frames.push(frame),
            // A clean end of stream surfaces as an EOF while reading the
            // next marker byte.
            Err(decode::Error::InvalidMarkerRead(err))
                if err.kind() == io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => return Err(err).context("failed to deserialize frame"),
        }
    }
    Ok(frames)
}

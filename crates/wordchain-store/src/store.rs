//! One JSON snapshot per room, guarded by an OS advisory lock.
//!
//! `<dir>/<roomId>.json` holds the complete [`Room`] record. Every command
//! opens the file, takes an exclusive lock (waiting for any other process
//! that holds it), reads, runs, and rewrites the file only if the room's
//! `state_version` moved.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use rand::Rng;
use wordchain_protocol::RoomId;
use wordchain_room::{Deck, GameConfig, Room, RoomLock, unix_millis};

use crate::StoreError;

/// Attempts at drawing an unused room id before giving up.
pub const MAX_ROOM_ID_ATTEMPTS: usize = 20_000;

#[derive(Debug, Clone)]
pub struct FileRoomStore {
    dir: PathBuf,
    config: GameConfig,
}

impl FileRoomStore {
    /// Opens (creating if needed) a snapshot directory.
    pub fn open(dir: impl Into<PathBuf>, config: GameConfig) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, config })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// A handle to one room's snapshot.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] for ids that are not four digits; such an id
    /// can never name a snapshot file.
    pub fn room(&self, room_id: &RoomId) -> Result<RoomFile, StoreError> {
        if !room_id.is_well_formed() {
            return Err(StoreError::NotFound(room_id.clone()));
        }
        Ok(RoomFile {
            room_id: room_id.clone(),
            path: self.path_for(room_id),
        })
    }

    /// Creates an empty room with a fresh shuffled deck.
    pub fn create_room(&self) -> Result<RoomId, StoreError> {
        self.create_room_with(|_| ()).map(|(room_id, ())| room_id)
    }

    /// Creates a room and runs `f` on it before the first write, so the
    /// new room is never visible without `f`'s changes.
    pub fn create_room_with<T, F>(&self, f: F) -> Result<(RoomId, T), StoreError>
    where
        F: FnOnce(&mut Room) -> T,
    {
        let mut rng = rand::rng();
        for _ in 0..MAX_ROOM_ID_ATTEMPTS {
            let room_id = RoomId::from_number(rng.random_range(0..10_000));
            let file = match self.claim(&room_id) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };

            FileExt::lock_exclusive(&file)?;
            let result = Room::new(room_id.clone(), Deck::shuffled(&mut rng), unix_millis())
                .map_err(StoreError::from)
                .and_then(|mut room| {
                    let out = f(&mut room);
                    write_snapshot(&file, &room)?;
                    Ok(out)
                });
            unlock(&file, &room_id);

            return match result {
                Ok(out) => {
                    tracing::info!(%room_id, "room created");
                    Ok((room_id, out))
                }
                Err(e) => {
                    let _ = fs::remove_file(self.path_for(&room_id));
                    Err(e)
                }
            };
        }
        Err(StoreError::NoRoomId(MAX_ROOM_ID_ATTEMPTS))
    }

    /// Writes `room` as a new snapshot. Fails if one already exists.
    pub fn insert_room(&self, room: &Room) -> Result<(), StoreError> {
        if !room.room_id.is_well_formed() {
            return Err(StoreError::NotFound(room.room_id.clone()));
        }
        let file = self.claim(&room.room_id)?;
        FileExt::lock_exclusive(&file)?;
        let result = write_snapshot(&file, room);
        unlock(&file, &room.room_id);
        result
    }

    /// Deletes snapshots of rooms nobody is connected to that have been
    /// idle longer than the configured TTL. Returns how many were removed.
    pub fn sweep_expired_at(&self, now: u64) -> Result<usize, StoreError> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(room_id) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(".json"))
                .map(RoomId::from)
                .filter(RoomId::is_well_formed)
            else {
                continue;
            };

            let ttl = self.config.room_ttl;
            let expired = match self.room(&room_id)?.remove_if(|room| room.is_expired(now, ttl)) {
                Ok(expired) => expired,
                Err(StoreError::NotFound(_)) => false,
                Err(e) => {
                    tracing::warn!(%room_id, error = %e, "skipping unreadable snapshot");
                    false
                }
            };
            if expired {
                tracing::info!(%room_id, "room expired");
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn path_for(&self, room_id: &RoomId) -> PathBuf {
        self.dir.join(format!("{room_id}.json"))
    }

    fn claim(&self, room_id: &RoomId) -> std::io::Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(self.path_for(room_id))
    }
}

/// One room's snapshot file.
#[derive(Debug, Clone)]
pub struct RoomFile {
    room_id: RoomId,
    path: PathBuf,
}

impl RoomFile {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens and locks the snapshot.
    ///
    /// A removed room leaves its file empty before unlinking it, so a
    /// holder that was queued on the old file sees zero bytes once it gets
    /// the lock and reports the room as gone.
    fn open_locked(&self) -> Result<File, StoreError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => StoreError::NotFound(self.room_id.clone()),
                _ => StoreError::Io(e),
            })?;

        FileExt::lock_exclusive(&file)?;
        match file.metadata() {
            Ok(meta) if meta.len() > 0 => Ok(file),
            Ok(_) => {
                unlock(&file, &self.room_id);
                Err(StoreError::NotFound(self.room_id.clone()))
            }
            Err(e) => {
                unlock(&file, &self.room_id);
                Err(e.into())
            }
        }
    }

    fn read_room(&self, file: &mut File) -> Result<Room, StoreError> {
        let mut raw = String::new();
        file.read_to_string(&mut raw)?;
        serde_json::from_str(&raw).map_err(|source| {
            tracing::warn!(room_id = %self.room_id, error = %source, "corrupt room snapshot");
            StoreError::Corrupt {
                room_id: self.room_id.clone(),
                source,
            }
        })
    }

    fn run_locked<T, F>(&self, file: &mut File, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Room) -> T,
    {
        let mut room = self.read_room(file)?;
        let version = room.state_version;
        let out = f(&mut room);
        if room.state_version != version {
            write_snapshot(file, &room)?;
        }
        Ok(out)
    }

    /// Deletes the snapshot if `pred` holds for the stored room.
    fn remove_if<P>(&self, pred: P) -> Result<bool, StoreError>
    where
        P: FnOnce(&Room) -> bool,
    {
        let mut file = self.open_locked()?;
        let result = self.read_room(&mut file).and_then(|room| {
            if !pred(&room) {
                return Ok(false);
            }
            file.set_len(0)?;
            file.sync_data()?;
            fs::remove_file(&self.path)?;
            Ok(true)
        });
        unlock(&file, &self.room_id);
        result
    }
}

impl RoomLock for RoomFile {
    type Error = StoreError;

    /// Blocks until no other holder has the file locked.
    fn with_locked<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Room) -> T,
    {
        let mut file = self.open_locked()?;
        let result = self.run_locked(&mut file, f);
        unlock(&file, &self.room_id);
        result
    }
}

fn write_snapshot(mut file: &File, room: &Room) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(room).map_err(StoreError::Encode)?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&bytes)?;
    file.sync_data()?;
    Ok(())
}

/// The lock also goes when the file is closed, so a failed unlock is only
/// worth a warning.
fn unlock(file: &File, room_id: &RoomId) {
    if let Err(e) = FileExt::unlock(file) {
        tracing::warn!(%room_id, error = %e, "failed to unlock room snapshot");
    }
}

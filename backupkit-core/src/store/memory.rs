//! In-memory [`BackupStore`].
//!
//! Not a database: everything lives in ordered maps and a rollback restores a
//! full snapshot. It exists for tests, the command line tool and as a model
//! of the semantics a real store must provide.

use std::collections::{BTreeMap, HashMap};

use super::{BackupStore, Entity, EntityKind, LocalId, Record};
use crate::error::{BackupError, BackupResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Tables {
    entities: BTreeMap<EntityKind, BTreeMap<LocalId, Entity>>,
    next_id: BTreeMap<EntityKind, u64>,
    /// `(kind, backup id) -> local id`, scoped to the current import.
    id_map: HashMap<(EntityKind, u64), LocalId>,
}

impl Tables {
    fn allocate(&mut self, kind: EntityKind) -> LocalId {
        let next = self.next_id.entry(kind).or_insert(1);
        let id = LocalId(*next);
        *next += 1;
        id
    }

    fn insert(&mut self, id: LocalId, mut entity: Entity) {
        match &mut entity.record {
            Record::Recipient(recipient) => recipient.id = id.0,
            Record::Chat(chat) => chat.id = id.0,
            _ => {}
        }
        self.entities
            .entry(entity.kind())
            .or_default()
            .insert(id, entity);
    }
}

/// Reference [`BackupStore`] backed by ordered maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Tables,
    snapshot: Option<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entity outside of any import, keeping the id it carries.
    ///
    /// Recipients and chats are stored under their own `id`; other kinds get
    /// the next free local id. Meant for building fixtures to export.
    pub fn seed(&mut self, entity: impl Into<Entity>) -> LocalId {
        let entity = entity.into();
        let kind = entity.kind();
        let own_id = match &entity.record {
            Record::Recipient(recipient) => Some(recipient.id),
            Record::Chat(chat) => Some(chat.id),
            _ => None,
        };
        let id = match own_id {
            Some(own) => {
                let next = self.tables.next_id.entry(kind).or_insert(1);
                *next = (*next).max(own.saturating_add(1));
                LocalId(own)
            }
            None => self.tables.allocate(kind),
        };
        self.tables.insert(id, entity);
        id
    }

    /// Entities of `kind` in local id order.
    pub fn entities(&self, kind: EntityKind) -> impl Iterator<Item = (LocalId, &Entity)> {
        self.tables
            .entities
            .get(&kind)
            .into_iter()
            .flat_map(|table| table.iter().map(|(id, entity)| (*id, entity)))
    }

    /// Looks up one entity.
    #[must_use]
    pub fn get(&self, kind: EntityKind, id: LocalId) -> Option<&Entity> {
        self.tables.entities.get(&kind)?.get(&id)
    }

    /// Total number of stored entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.entities.values().map(BTreeMap::len).sum()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an import is in progress.
    #[must_use]
    pub const fn in_import(&self) -> bool {
        self.snapshot.is_some()
    }
}

impl BackupStore for MemoryStore {
    fn visit(
        &self,
        kind: EntityKind,
        visitor: &mut dyn FnMut(LocalId, &Entity) -> BackupResult<()>,
    ) -> BackupResult<()> {
        for (id, entity) in self.entities(kind) {
            visitor(id, entity)?;
        }
        Ok(())
    }

    fn upsert(&mut self, backup_id: Option<u64>, entity: Entity) -> BackupResult<LocalId> {
        let kind = entity.kind();
        let id = match backup_id {
            Some(backup_id) => {
                if let Some(existing) = self.tables.id_map.get(&(kind, backup_id)) {
                    *existing
                } else {
                    let id = self.tables.allocate(kind);
                    self.tables.id_map.insert((kind, backup_id), id);
                    id
                }
            }
            None => self.tables.allocate(kind),
        };
        self.tables.insert(id, entity);
        Ok(id)
    }

    fn resolve(&self, kind: EntityKind, backup_id: u64) -> Option<LocalId> {
        self.tables.id_map.get(&(kind, backup_id)).copied()
    }

    fn begin_import(&mut self) -> BackupResult<()> {
        if self.snapshot.is_some() {
            return Err(BackupError::store("an import is already in progress"));
        }
        self.snapshot = Some(self.tables.clone());
        self.tables.id_map.clear();
        Ok(())
    }

    fn commit_import(&mut self) -> BackupResult<()> {
        if self.snapshot.take().is_none() {
            return Err(BackupError::store("no import in progress"));
        }
        Ok(())
    }

    fn rollback_import(&mut self) -> BackupResult<()> {
        let Some(snapshot) = self.snapshot.take() else {
            return Err(BackupError::store("no import in progress"));
        };
        self.tables = snapshot;
        Ok(())
    }
}

//! Device-local study collections. Stored as JSON arrays in the local store
//! and never synced to the server.

use anyhow::{ensure, Context};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::store::KeyValueStore;
use crate::flashcards::repo_types::Card;

pub const MAX_PROFICIENCY: u8 = 5;

pub trait LocalRecord: Serialize + DeserializeOwned {
    /// Store key holding the collection.
    const KEY: &'static str;

    fn id(&self) -> &str;

    /// Assigns identity and creation time on insert.
    fn stamp(&mut self, id: String, now: OffsetDateTime);

    fn check(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalFlashcardSet {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub cards: Vec<Card>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

impl LocalRecord for LocalFlashcardSet {
    const KEY: &'static str = "flashcardSets";

    fn id(&self) -> &str {
        &self.id
    }

    fn stamp(&mut self, id: String, now: OffsetDateTime) {
        self.id = id;
        self.created_at = Some(now);
    }

    fn check(&self) -> anyhow::Result<()> {
        ensure!(!self.title.trim().is_empty(), "title is required");
        ensure!(!self.category.trim().is_empty(), "category is required");
        ensure!(
            self.cards
                .iter()
                .all(|c| !c.term.trim().is_empty() && !c.definition.trim().is_empty()),
            "every card needs a term and a definition"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseStudy {
    #[serde(default)]
    pub id: String,
    pub chief_complaint: String,
    #[serde(default)]
    pub history_of_present_illness: String,
    #[serde(default)]
    pub past_medical_history: String,
    #[serde(default)]
    pub medications: String,
    #[serde(default)]
    pub physical_exam: String,
    #[serde(default)]
    pub differential_diagnosis: Vec<String>,
    #[serde(default)]
    pub workup: Vec<String>,
    #[serde(default)]
    pub treatment: Vec<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

impl LocalRecord for CaseStudy {
    const KEY: &'static str = "medicalCases";

    fn id(&self) -> &str {
        &self.id
    }

    fn stamp(&mut self, id: String, now: OffsetDateTime) {
        self.id = id;
        self.created_at = Some(now);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalSkill {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub proficiency: u8,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_practiced: Option<OffsetDateTime>,
    #[serde(default)]
    pub notes: String,
}

impl LocalRecord for ClinicalSkill {
    const KEY: &'static str = "clinicalSkills";

    fn id(&self) -> &str {
        &self.id
    }

    fn stamp(&mut self, id: String, now: OffsetDateTime) {
        self.id = id;
        self.last_practiced.get_or_insert(now);
    }

    fn check(&self) -> anyhow::Result<()> {
        ensure!(!self.name.trim().is_empty(), "skill name is required");
        ensure!(
            self.proficiency <= MAX_PROFICIENCY,
            "proficiency must be between 0 and {}",
            MAX_PROFICIENCY
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

impl LocalRecord for Note {
    const KEY: &'static str = "notes";

    fn id(&self) -> &str {
        &self.id
    }

    fn stamp(&mut self, id: String, now: OffsetDateTime) {
        self.id = id;
        self.created_at = Some(now);
    }

    fn check(&self) -> anyhow::Result<()> {
        ensure!(!self.title.trim().is_empty(), "title is required");
        Ok(())
    }
}

/// Typed access to the local collections. Each write rewrites the whole
/// collection; last write wins.
pub struct LocalData<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> LocalData<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn list<T: LocalRecord>(&self) -> anyhow::Result<Vec<T>> {
        match self.store.get(T::KEY)? {
            None => Ok(Vec::new()),
            Some(raw) => {
                serde_json::from_str(&raw).with_context(|| format!("parse local {}", T::KEY))
            }
        }
    }

    fn save<T: LocalRecord>(&mut self, items: &[T]) -> anyhow::Result<()> {
        let raw = serde_json::to_string(items)?;
        self.store.set(T::KEY, &raw)
    }

    pub fn add<T: LocalRecord>(&mut self, mut record: T) -> anyhow::Result<T> {
        record.check()?;
        record.stamp(Uuid::new_v4().to_string(), OffsetDateTime::now_utc());
        let mut items = self.list::<T>()?;
        items.push(record);
        self.save(&items)?;
        items.pop().context("record vanished after insert")
    }

    /// Returns `false` when no record has the same id.
    pub fn replace<T: LocalRecord>(&mut self, record: T) -> anyhow::Result<bool> {
        record.check()?;
        let mut items = self.list::<T>()?;
        let Some(slot) = items.iter_mut().find(|it| it.id() == record.id()) else {
            return Ok(false);
        };
        *slot = record;
        self.save(&items)?;
        Ok(true)
    }

    pub fn remove<T: LocalRecord>(&mut self, id: &str) -> anyhow::Result<bool> {
        let mut items = self.list::<T>()?;
        let before = items.len();
        items.retain(|it| it.id() != id);
        if items.len() == before {
            return Ok(false);
        }
        self.save(&items)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::store::{FileStore, MemoryStore};

    fn skill(name: &str, proficiency: u8) -> ClinicalSkill {
        ClinicalSkill {
            name: name.into(),
            category: "Procedures".into(),
            proficiency,
            ..Default::default()
        }
    }

    #[test]
    fn add_assigns_id_and_collections_stay_separate() {
        let mut data = LocalData::new(MemoryStore::default());
        let a = data.add(skill("Venipuncture", 3)).unwrap();
        let b = data.add(skill("Suturing", 1)).unwrap();
        assert!(!a.id.is_empty());
        assert_ne!(a.id, b.id);
        assert!(a.last_practiced.is_some());

        let note = data
            .add(Note {
                title: "Cranial nerves".into(),
                ..Default::default()
            })
            .unwrap();
        assert!(note.created_at.is_some());

        assert_eq!(data.list::<ClinicalSkill>().unwrap().len(), 2);
        assert_eq!(data.list::<Note>().unwrap().len(), 1);
        assert!(data.list::<CaseStudy>().unwrap().is_empty());
    }

    #[test]
    fn invalid_records_are_rejected() {
        let mut data = LocalData::new(MemoryStore::default());
        assert!(data.add(skill("Intubation", 6)).is_err());
        assert!(data.add(skill("  ", 2)).is_err());
        assert!(data
            .add(LocalFlashcardSet {
                title: "Cardio".into(),
                category: "".into(),
                ..Default::default()
            })
            .is_err());
        assert!(data.list::<ClinicalSkill>().unwrap().is_empty());
    }

    #[test]
    fn replace_and_remove_by_id() {
        let mut data = LocalData::new(MemoryStore::default());
        let mut s = data.add(skill("Venipuncture", 2)).unwrap();
        s.proficiency = 4;
        assert!(data.replace(s.clone()).unwrap());
        assert_eq!(data.list::<ClinicalSkill>().unwrap()[0].proficiency, 4);

        assert!(!data.remove::<ClinicalSkill>("missing").unwrap());
        assert!(data.remove::<ClinicalSkill>(&s.id).unwrap());
        assert!(!data.replace(s).unwrap());
    }

    #[test]
    fn reads_camel_case_written_by_other_clients() {
        let mut store = MemoryStore::default();
        store
            .set(
                "medicalCases",
                r#"[{"id":"1712","chiefComplaint":"Chest pain","differentialDiagnosis":["ACS","PE"],"createdAt":"2024-04-10T12:00:00Z"}]"#,
            )
            .unwrap();
        let data = LocalData::new(store);
        let cases = data.list::<CaseStudy>().unwrap();
        assert_eq!(cases[0].chief_complaint, "Chest pain");
        assert_eq!(cases[0].differential_diagnosis, vec!["ACS", "PE"]);
    }

    #[test]
    fn flashcards_persist_in_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        let set = LocalFlashcardSet {
            title: "Cardio".into(),
            category: "Physiology".into(),
            cards: vec![Card {
                term: "Preload".into(),
                definition: "end-diastolic volume".into(),
            }],
            ..Default::default()
        };
        let saved = LocalData::new(FileStore::open(&path, false).unwrap())
            .add(set)
            .unwrap();

        let reopened = LocalData::new(FileStore::open(&path, false).unwrap());
        assert_eq!(reopened.list::<LocalFlashcardSet>().unwrap(), vec![saved]);
    }
}

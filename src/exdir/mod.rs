//! Minimal Exdir access: groups are directories, datasets are `.npy` arrays,
//! attributes are YAML.
//!
//! ```text
//!  recording.exdir/            exdir.yaml  (type: file)
//!  ├── attributes.yaml
//!  ├── epochs/                 exdir.yaml  (type: group)
//!  │   └── visual/
//!  │       └── timestamps/     exdir.yaml  (type: dataset)
//!  │           ├── attributes.yaml   unit: s
//!  │           └── data.npy
//!  └── processing/ ...
//! ```
//!
//! Every read opens and closes its own file handles, so [`File`], [`Group`] and
//! [`Dataset`] are plain path wrappers and cheap to clone.
pub mod attributes;
pub mod npy;

use std::fmt;
use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use ndarray::{ArrayBase, ArrayD, Data, Dimension};
use ndarray_npy::{ReadNpyError, WritableElement, WriteNpyError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::units::UnitError;

pub use attributes::Attributes;
pub use npy::DatasetData;

const META_FILENAME: &str = "exdir.yaml";
const ATTRIBUTES_FILENAME: &str = "attributes.yaml";
const DATA_FILENAME: &str = "data.npy";
const EXDIR_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ExdirError {
    #[error("'{}' is not an Exdir object (missing exdir.yaml)", .0.display())]
    NotExdir(PathBuf),
    #[error("object '{name}' not found in '{parent}'")]
    NotFound { parent: String, name: String },
    #[error("'{0}' is not a group")]
    NotAGroup(String),
    #[error("'{0}' is not a dataset")]
    NotADataset(String),
    #[error("object '{0}' already exists")]
    AlreadyExists(String),
    #[error("invalid object name '{0}'")]
    InvalidName(String),
    #[error("attribute '{attr}' missing on '{object}'")]
    MissingAttribute { object: String, attr: String },
    #[error("attribute '{attr}' on '{object}' is malformed: {reason}")]
    InvalidAttribute {
        object: String,
        attr: String,
        reason: String,
    },
    #[error("unsupported dtype '{descr}' in '{object}'")]
    UnsupportedDtype { object: String, descr: String },
    #[error("malformed npy data in '{object}': {reason}")]
    MalformedNpy { object: String, reason: String },
    #[error("expected {expected} data in '{object}'")]
    WrongDataKind {
        object: String,
        expected: &'static str,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to read array: {0}")]
    ReadNpy(#[from] ReadNpyError),
    #[error("failed to write array: {0}")]
    WriteNpy(#[from] WriteNpyError),
    #[error(transparent)]
    Unit(#[from] UnitError),
}

pub type Result<T> = std::result::Result<T, ExdirError>;

// ---------------------------------------------------------------------------
// exdir.yaml
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    File,
    Group,
    Dataset,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::File => write!(f, "file"),
            ObjectKind::Group => write!(f, "group"),
            ObjectKind::Dataset => write!(f, "dataset"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Meta {
    exdir: MetaInner,
}

#[derive(Debug, Serialize, Deserialize)]
struct MetaInner {
    #[serde(rename = "type")]
    kind: ObjectKind,
    version: u32,
}

fn read_kind(dir: &Path) -> Result<ObjectKind> {
    let meta_path = dir.join(META_FILENAME);
    if !meta_path.is_file() {
        return Err(ExdirError::NotExdir(dir.to_path_buf()));
    }
    let text = fs::read_to_string(meta_path)?;
    let meta: Meta = serde_yaml::from_str(&text)?;
    Ok(meta.exdir.kind)
}

fn write_meta(dir: &Path, kind: ObjectKind) -> Result<()> {
    let meta = Meta {
        exdir: MetaInner {
            kind,
            version: EXDIR_VERSION,
        },
    };
    fs::write(dir.join(META_FILENAME), serde_yaml::to_string(&meta)?)?;
    Ok(())
}

fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(&['/', '\\'][..])
        || name == META_FILENAME
        || name == ATTRIBUTES_FILENAME
        || name == "raw";
    if bad {
        return Err(ExdirError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn join_name(parent: &str, child: &str) -> String {
    if parent == "/" {
        format!("/{child}")
    } else {
        format!("{parent}/{child}")
    }
}

// ---------------------------------------------------------------------------
// Shared object behaviour
// ---------------------------------------------------------------------------

fn read_attrs(dir: &Path, name: &str) -> Result<Attributes> {
    let path = dir.join(ATTRIBUTES_FILENAME);
    if !path.is_file() {
        return Ok(Attributes::empty(name));
    }
    let text = fs::read_to_string(path)?;
    Attributes::from_yaml(name, &text)
}

fn write_attrs(dir: &Path, attrs: &Attributes) -> Result<()> {
    fs::write(dir.join(ATTRIBUTES_FILENAME), attrs.to_yaml()?)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// File
// ---------------------------------------------------------------------------

/// The root of a container. Dereferences to its root [`Group`].
#[derive(Debug, Clone)]
pub struct File {
    root: Group,
}

impl File {
    /// Open an existing container read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<File> {
        let dir = path.as_ref();
        match read_kind(dir)? {
            ObjectKind::File => {}
            _ => return Err(ExdirError::NotExdir(dir.to_path_buf())),
        }
        log::debug!("opened exdir file {}", dir.display());
        Ok(File {
            root: Group {
                dir: dir.to_path_buf(),
                name: "/".to_string(),
            },
        })
    }

    /// Create a new, empty container. Fails if the directory already exists.
    pub fn create(path: impl AsRef<Path>) -> Result<File> {
        let dir = path.as_ref();
        if dir.exists() {
            return Err(ExdirError::AlreadyExists(dir.display().to_string()));
        }
        fs::create_dir_all(dir)?;
        write_meta(dir, ObjectKind::File)?;
        Ok(File {
            root: Group {
                dir: dir.to_path_buf(),
                name: "/".to_string(),
            },
        })
    }
}

impl Deref for File {
    type Target = Group;

    fn deref(&self) -> &Group {
        &self.root
    }
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Group {
    dir: PathBuf,
    name: String,
}

impl Group {
    /// Absolute object name inside the container, e.g. `/epochs/visual`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn attrs(&self) -> Result<Attributes> {
        read_attrs(&self.dir, &self.name)
    }

    pub fn set_attrs(&self, attrs: &Attributes) -> Result<()> {
        write_attrs(&self.dir, attrs)
    }

    /// Names of the direct children, sorted.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() && path.join(META_FILENAME).is_file() {
                keys.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        keys.sort();
        Ok(keys)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name)
            .map(|(dir, _)| dir.join(META_FILENAME).is_file())
            .unwrap_or(false)
    }

    /// Kind of the child at `name` (which may be a `/`-separated path).
    pub fn kind_of(&self, name: &str) -> Result<ObjectKind> {
        let (dir, _) = self.resolve(name)?;
        read_kind(&dir)
    }

    /// Look up a descendant group; `name` may be a `/`-separated path.
    pub fn group(&self, name: &str) -> Result<Group> {
        let (dir, full) = self.resolve(name)?;
        match read_kind(&dir)? {
            ObjectKind::Group | ObjectKind::File => Ok(Group { dir, name: full }),
            ObjectKind::Dataset => Err(ExdirError::NotAGroup(full)),
        }
    }

    /// Look up a descendant dataset; `name` may be a `/`-separated path.
    pub fn dataset(&self, name: &str) -> Result<Dataset> {
        let (dir, full) = self.resolve(name)?;
        match read_kind(&dir)? {
            ObjectKind::Dataset => Ok(Dataset { dir, name: full }),
            _ => Err(ExdirError::NotADataset(full)),
        }
    }

    /// All child groups, sorted by name. Datasets are skipped.
    pub fn groups(&self) -> Result<Vec<Group>> {
        let mut groups = Vec::new();
        for key in self.keys()? {
            if self.kind_of(&key)? == ObjectKind::Group {
                groups.push(self.group(&key)?);
            }
        }
        Ok(groups)
    }

    pub fn create_group(&self, name: &str) -> Result<Group> {
        let (dir, full) = self.prepare_child(name)?;
        write_meta(&dir, ObjectKind::Group)?;
        Ok(Group { dir, name: full })
    }

    /// Return the child group `name`, creating it if needed.
    pub fn require_group(&self, name: &str) -> Result<Group> {
        if self.contains(name) {
            self.group(name)
        } else {
            self.create_group(name)
        }
    }

    pub fn create_dataset<A, S, D>(&self, name: &str, data: &ArrayBase<S, D>) -> Result<Dataset>
    where
        A: WritableElement,
        S: Data<Elem = A>,
        D: Dimension,
    {
        let (dir, full) = self.prepare_child(name)?;
        write_meta(&dir, ObjectKind::Dataset)?;
        ndarray_npy::write_npy(dir.join(DATA_FILENAME), data)?;
        Ok(Dataset { dir, name: full })
    }

    /// Create a 1-D dataset of fixed-width unicode strings (`<U*`).
    pub fn create_text_dataset<T: AsRef<str>>(&self, name: &str, values: &[T]) -> Result<Dataset> {
        let (dir, full) = self.prepare_child(name)?;
        write_meta(&dir, ObjectKind::Dataset)?;
        npy::write_text(&dir.join(DATA_FILENAME), values)?;
        Ok(Dataset { dir, name: full })
    }

    fn prepare_child(&self, name: &str) -> Result<(PathBuf, String)> {
        validate_name(name)?;
        let dir = self.dir.join(name);
        let full = join_name(&self.name, name);
        if dir.exists() {
            return Err(ExdirError::AlreadyExists(full));
        }
        fs::create_dir(&dir)?;
        Ok((dir, full))
    }

    fn resolve(&self, name: &str) -> Result<(PathBuf, String)> {
        let mut dir = self.dir.clone();
        let mut full = self.name.clone();
        for part in name.split('/').filter(|p| !p.is_empty()) {
            validate_name(part)?;
            let next = dir.join(part);
            if !next.join(META_FILENAME).is_file() {
                return Err(ExdirError::NotFound {
                    parent: full,
                    name: part.to_string(),
                });
            }
            dir = next;
            full = join_name(&full, part);
        }
        Ok((dir, full))
    }
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Dataset {
    dir: PathBuf,
    name: String,
}

impl Dataset {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn attrs(&self) -> Result<Attributes> {
        read_attrs(&self.dir, &self.name)
    }

    pub fn set_attrs(&self, attrs: &Attributes) -> Result<()> {
        write_attrs(&self.dir, attrs)
    }

    /// Read the stored array, numeric or text.
    pub fn read(&self) -> Result<DatasetData> {
        let bytes = fs::read(self.dir.join(DATA_FILENAME))?;
        npy::read(&self.name, &bytes)
    }

    /// Read a numeric array, converted to `f64`.
    pub fn read_f64(&self) -> Result<ArrayD<f64>> {
        match self.read()? {
            DatasetData::Numeric(array) => Ok(array),
            DatasetData::Text(_) => Err(ExdirError::WrongDataKind {
                object: self.name.clone(),
                expected: "numeric",
            }),
        }
    }

    pub fn read_text(&self) -> Result<ArrayD<String>> {
        match self.read()? {
            DatasetData::Text(array) => Ok(array),
            DatasetData::Numeric(_) => Err(ExdirError::WrongDataKind {
                object: self.name.clone(),
                expected: "text",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};
    use tempfile::TempDir;

    fn scratch() -> (TempDir, File) {
        let tmp = TempDir::new().unwrap();
        let file = File::create(tmp.path().join("test.exdir")).unwrap();
        (tmp, file)
    }

    #[test]
    fn creates_and_walks_nested_groups() {
        let (_tmp, file) = scratch();
        let ephys = file.create_group("processing").unwrap();
        let group = ephys.create_group("electrophysiology").unwrap();
        assert_eq!(group.name(), "/processing/electrophysiology");

        let reopened = File::open(file.path()).unwrap();
        let found = reopened.group("processing/electrophysiology").unwrap();
        assert_eq!(found.name(), "/processing/electrophysiology");
        assert_eq!(reopened.keys().unwrap(), vec!["processing".to_string()]);
    }

    #[test]
    fn missing_object_is_a_lookup_failure() {
        let (_tmp, file) = scratch();
        let err = file.group("epochs").unwrap_err();
        assert!(matches!(err, ExdirError::NotFound { ref name, .. } if name == "epochs"));
    }

    #[test]
    fn dataset_round_trips_numeric_and_text() {
        let (_tmp, file) = scratch();
        file.create_dataset("ints", &array![3i64, 1, 2]).unwrap();
        file.create_text_dataset("labels", &["grating", "blank"])
            .unwrap();

        let ints = file.dataset("ints").unwrap().read_f64().unwrap();
        assert_eq!(ints.iter().copied().collect::<Vec<_>>(), vec![3.0, 1.0, 2.0]);

        let labels = file.dataset("labels").unwrap().read_text().unwrap();
        assert_eq!(
            labels.iter().cloned().collect::<Vec<_>>(),
            vec!["grating".to_string(), "blank".to_string()]
        );
        assert!(file.dataset("labels").unwrap().read_f64().is_err());
    }

    #[test]
    fn group_and_dataset_kinds_are_checked() {
        let (_tmp, file) = scratch();
        file.create_dataset("data", &Array1::<f64>::zeros(4)).unwrap();
        file.create_group("LFP").unwrap();
        assert!(matches!(file.group("data"), Err(ExdirError::NotAGroup(_))));
        assert!(matches!(file.dataset("LFP"), Err(ExdirError::NotADataset(_))));
        assert_eq!(file.groups().unwrap().len(), 1);
    }

    #[test]
    fn refuses_reserved_names() {
        let (_tmp, file) = scratch();
        assert!(matches!(
            file.create_group("raw"),
            Err(ExdirError::InvalidName(_))
        ));
        assert!(matches!(
            file.create_group("a/b"),
            Err(ExdirError::InvalidName(_))
        ));
    }
}

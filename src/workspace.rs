//! Job workspace staging and submission.
//!
//! A generated morphline is staged into a fresh per-job workspace together
//! with the workflow definition and logging configuration, then handed to a
//! [`JobSubmitter`]. Filesystem access goes through [`FileSystem`], acting as
//! the requesting user.

use std::{
    collections::BTreeMap,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Component, Path, PathBuf},
};

use chrono::Utc;
use log::{debug, info};

use crate::{
    error::{IndexerError, IndexerResult},
    template::{LOG4J_TEMPLATE, TemplateLookup, WORKFLOW_TEMPLATE},
};

pub const MORPHLINE_FILE: &str = "morphline.conf";
pub const JOB_PROPERTIES_FILE: &str = "job.properties";
pub const DEFAULT_WORKSPACE_ROOT: &str = "/user/$USER/oozie/workspaces";

pub type JobProperties = BTreeMap<String, String>;

/// Distributed filesystem operations, each performed as `user`.
pub trait FileSystem {
    fn mkdir(&self, user: &str, path: &str) -> io::Result<()>;
    /// Create a new file; an existing file is an error.
    fn create(&self, user: &str, path: &str, data: &[u8]) -> io::Result<()>;
    /// Move `src` to `dst`; an existing `dst` is an error.
    fn rename(&self, user: &str, src: &str, dst: &str) -> io::Result<()>;
    fn exists(&self, user: &str, path: &str) -> io::Result<bool>;
}

/// Accepts a staged workspace and returns the scheduler's job id.
pub trait JobSubmitter {
    fn submit(
        &self,
        user: &str,
        workspace_path: &str,
        properties: &JobProperties,
    ) -> IndexerResult<String>;
}

/// [`FileSystem`] over a local directory standing in for the cluster root:
/// `/user/alice` maps to `<root>/user/alice`.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let mut resolved = self.root.clone();
        for component in Path::new(path).components() {
            match component {
                Component::RootDir | Component::CurDir => {}
                Component::Normal(part) => resolved.push(part),
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("path {path:?} escapes the filesystem root"),
                    ));
                }
            }
        }
        Ok(resolved)
    }
}

impl FileSystem for LocalFileSystem {
    fn mkdir(&self, user: &str, path: &str) -> io::Result<()> {
        debug!("mkdir {path} as {user}");
        fs::create_dir_all(self.resolve(path)?)
    }

    fn create(&self, user: &str, path: &str, data: &[u8]) -> io::Result<()> {
        debug!("create {path} ({} bytes) as {user}", data.len());
        let target = self.resolve(path)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)?;
        file.write_all(data)?;
        file.flush()
    }

    fn rename(&self, user: &str, src: &str, dst: &str) -> io::Result<()> {
        debug!("rename {src} -> {dst} as {user}");
        let from = self.resolve(src)?;
        let to = self.resolve(dst)?;
        if to.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{dst} exists"),
            ));
        }
        fs::rename(from, to)
    }

    fn exists(&self, _user: &str, path: &str) -> io::Result<bool> {
        self.resolve(path)?.try_exists()
    }
}

/// Submitter that only records the job: the properties are written to
/// `job.properties` inside the workspace and no scheduler is contacted.
pub struct DryRunSubmitter<'a> {
    fs: &'a dyn FileSystem,
}

impl<'a> DryRunSubmitter<'a> {
    pub fn new(fs: &'a dyn FileSystem) -> Self {
        Self { fs }
    }
}

impl JobSubmitter for DryRunSubmitter<'_> {
    fn submit(
        &self,
        user: &str,
        workspace_path: &str,
        properties: &JobProperties,
    ) -> IndexerResult<String> {
        let path = join_path(workspace_path, JOB_PROPERTIES_FILE);
        self.fs
            .create(user, &path, render_properties(properties).as_bytes())?;
        info!("Dry run: job properties written to {path}");
        Ok(format!("dryrun:{workspace_path}"))
    }
}

/// `key=value` lines in key order.
pub fn render_properties(properties: &JobProperties) -> String {
    properties
        .iter()
        .map(|(key, value)| format!("{key}={value}\n"))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSettings {
    pub zk_host: String,
    pub libs_path: String,
    /// Parent of job workspaces; `$USER` is replaced with the submitting user.
    pub workspace_root: String,
    pub security_enabled: bool,
    pub dryrun: bool,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            zk_host: String::new(),
            libs_path: String::new(),
            workspace_root: DEFAULT_WORKSPACE_ROOT.to_string(),
            security_enabled: false,
            dryrun: false,
        }
    }
}

pub struct Indexer<'a> {
    username: String,
    fs: &'a dyn FileSystem,
    templates: &'a TemplateLookup,
    settings: JobSettings,
}

impl<'a> Indexer<'a> {
    pub fn new(
        username: impl Into<String>,
        fs: &'a dyn FileSystem,
        templates: &'a TemplateLookup,
        settings: JobSettings,
    ) -> Self {
        Self {
            username: username.into(),
            fs,
            templates,
            settings,
        }
    }

    /// Workspace path for a job created at `stamp` (milliseconds since the
    /// epoch).
    pub fn workspace_path(&self, stamp: i64) -> String {
        let root = self.settings.workspace_root.replace("$USER", &self.username);
        join_path(&root, &format!("hue-oozie-{stamp}"))
    }

    /// Create a fresh workspace holding the morphline, workflow, and log4j
    /// configuration. Returns the workspace path.
    pub fn upload_workspace(&self, morphline: &str) -> IndexerResult<String> {
        let workspace = self.workspace_path(Utc::now().timestamp_millis());
        let workflow = self.templates.get_template(WORKFLOW_TEMPLATE)?;
        let log4j = self.templates.get_template(LOG4J_TEMPLATE)?;

        self.fs.mkdir(&self.username, &workspace)?;
        for (name, body) in [
            (MORPHLINE_FILE, morphline),
            (WORKFLOW_TEMPLATE, workflow.as_str()),
            (LOG4J_TEMPLATE, log4j.as_str()),
        ] {
            self.fs
                .create(&self.username, &join_path(&workspace, name), body.as_bytes())?;
        }
        info!("Staged workspace {workspace} for {}", self.username);
        Ok(workspace)
    }

    pub fn job_properties(
        &self,
        workspace_path: &str,
        collection_name: &str,
        input_path: &str,
    ) -> JobProperties {
        let flag = |value: bool| if value { "True" } else { "False" }.to_string();
        BTreeMap::from([
            ("dryrun".to_string(), flag(self.settings.dryrun)),
            ("zkHost".to_string(), self.settings.zk_host.clone()),
            ("oozie.libpath".to_string(), self.settings.libs_path.clone()),
            (
                "security_enabled".to_string(),
                flag(self.settings.security_enabled),
            ),
            ("collectionName".to_string(), collection_name.to_string()),
            ("filePath".to_string(), input_path.to_string()),
            (
                "outputDir".to_string(),
                format!("/user/{}/indexer", self.username),
            ),
            ("workspacePath".to_string(), workspace_path.to_string()),
            (
                "oozie.wf.application.path".to_string(),
                format!("${{nameNode}}{workspace_path}"),
            ),
            ("user.name".to_string(), self.username.clone()),
        ])
    }

    /// Stage `morphline` and submit the indexing job. Returns the job id.
    pub fn run_morphline(
        &self,
        submitter: &dyn JobSubmitter,
        collection_name: &str,
        morphline: &str,
        input_path: &str,
    ) -> IndexerResult<String> {
        if collection_name.trim().is_empty() {
            return Err(IndexerError::InvalidForm(
                "collection name is required".to_string(),
            ));
        }
        let workspace = self.upload_workspace(morphline)?;
        let properties = self.job_properties(&workspace, collection_name, input_path);
        let job_id = submitter.submit(&self.username, &workspace, &properties)?;
        info!("Submitted indexing job {job_id} for collection '{collection_name}'");
        Ok(job_id)
    }
}

pub fn join_path(parent: &str, child: &str) -> String {
    format!(
        "{}/{}",
        parent.trim_end_matches('/'),
        child.trim_start_matches('/')
    )
}

//! Worklist dependency resolver with bounded backtracking over remote projects.
//!
//! Each requested name is classified, transitively, as one of:
//! - a workspace package (accepted, its dependencies enqueued),
//! - a package from a remote project that has to be cloned,
//! - a system dependency satisfied by the host package manager,
//! - a conflict, with the chain of reasons that ruled out every option.
//!
//! Remote projects bundle several packages, so picking one commits the
//! workspace to all of its siblings. When several projects offer the same
//! name, every admissible project is tried on a copy of the state and the
//! branches are compared. The search is exponential in the worst case (nested
//! ambiguous choices multiply); real workspaces rarely have more than a handful
//! of ambiguous names, so branch results are not memoized.

use crate::CoreError;
use rosws_index::{PackageIndex, RemotePackage, RemoteProject, WorkspacePackage};
use rosws_schema::{PackageManifest, PackageName, ProjectId};
use rosws_sysdep::SystemOracle;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::Write as _;
use tracing::{debug, info, trace, warn};

/// Where an accepted package comes from.
#[derive(Debug, Clone, Copy)]
pub enum PackageSource<'a> {
    Workspace(&'a WorkspacePackage),
    Remote(&'a RemotePackage),
}

impl<'a> PackageSource<'a> {
    pub fn manifest(&self) -> &'a PackageManifest {
        match self {
            Self::Workspace(pkg) => &pkg.manifest,
            Self::Remote(pkg) => &pkg.manifest,
        }
    }

    /// The remote project to clone, `None` for workspace packages.
    pub fn project(&self) -> Option<&'a ProjectId> {
        match self {
            Self::Workspace(_) => None,
            Self::Remote(pkg) => Some(&pkg.project),
        }
    }

    pub fn is_workspace(&self) -> bool {
        matches!(self, Self::Workspace(_))
    }
}

/// Outcome of one resolver run.
///
/// Every name the run touched ends up in exactly one of the three maps.
#[derive(Debug, Clone, Default)]
pub struct Resolution<'a> {
    pub depends: BTreeMap<PackageName, PackageSource<'a>>,
    pub system_depends: BTreeSet<PackageName>,
    /// Unresolvable name -> reasons, most general first.
    pub conflicts: BTreeMap<PackageName, Vec<String>>,
}

impl<'a> Resolution<'a> {
    pub fn is_resolved(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn ensure_resolved(&self) -> Result<(), CoreError> {
        if self.is_resolved() {
            Ok(())
        } else {
            Err(CoreError::Unresolved(self.conflicts.len()))
        }
    }

    pub fn is_classified(&self, name: &str) -> bool {
        self.depends.contains_key(name)
            || self.system_depends.contains(name)
            || self.conflicts.contains_key(name)
    }

    pub fn workspace_packages(&self) -> impl Iterator<Item = &'a WorkspacePackage> + '_ {
        self.depends.values().filter_map(|src| match src {
            PackageSource::Workspace(pkg) => Some(*pkg),
            PackageSource::Remote(_) => None,
        })
    }

    pub fn remote_packages(&self) -> impl Iterator<Item = &'a RemotePackage> + '_ {
        self.depends.values().filter_map(|src| match src {
            PackageSource::Remote(pkg) => Some(*pkg),
            PackageSource::Workspace(_) => None,
        })
    }

    /// Distinct remote projects the accepted packages come from.
    pub fn selected_projects(&self) -> BTreeSet<&'a ProjectId> {
        self.depends
            .values()
            .filter_map(PackageSource::project)
            .collect()
    }
}

/// Caller-supplied disambiguation: given a name and the viable remote
/// candidates (first-found order), return the index of the one to use, or
/// `None` to let the resolver pick.
pub type Chooser<'c> = dyn Fn(&PackageName, &[&RemotePackage]) -> Option<usize> + 'c;

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Never consult the chooser; always apply the automatic tie-break.
    pub auto_resolve: bool,
}

#[derive(Debug, Clone)]
struct QueueEntry {
    /// The requested package this entry was pulled in for; `None` at root level.
    root: Option<PackageName>,
    requester: Option<PackageName>,
    name: PackageName,
}

impl QueueEntry {
    fn requested(name: PackageName) -> Self {
        Self {
            root: None,
            requester: None,
            name,
        }
    }
}

/// A root-level system-only name awaiting a depender.
type Deferred = Vec<(PackageName, Vec<String>)>;

pub struct Resolver<'a, 'c> {
    index: &'a PackageIndex,
    oracle: &'a dyn SystemOracle,
    options: ResolveOptions,
    chooser: Option<&'c Chooser<'c>>,
}

impl<'a, 'c> Resolver<'a, 'c> {
    pub fn new(index: &'a PackageIndex, oracle: &'a dyn SystemOracle) -> Self {
        Self {
            index,
            oracle,
            options: ResolveOptions::default(),
            chooser: None,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_chooser(mut self, chooser: &'c Chooser<'c>) -> Self {
        self.chooser = Some(chooser);
        self
    }

    /// Resolve `requested` and everything it depends on.
    ///
    /// Unresolvable names are reported in [`Resolution::conflicts`]; only a
    /// failing system dependency oracle aborts the run.
    pub fn resolve<I, N>(&self, requested: I) -> Result<Resolution<'a>, CoreError>
    where
        I: IntoIterator<Item = N>,
        N: Into<PackageName>,
    {
        let queue: VecDeque<QueueEntry> = requested
            .into_iter()
            .map(|n| QueueEntry::requested(n.into()))
            .collect();
        info!("resolving {} requested package(s)", queue.len());

        let mut deferred = Deferred::new();
        let mut state = self.run(Resolution::default(), queue, &mut deferred, false)?;

        // Root-level system-only names survive only if something depends on them.
        for (name, reasons) in deferred {
            if !state.is_classified(&name) {
                debug!("requested package {name} is a system dependency only");
                state.conflicts.insert(name, reasons);
            }
        }

        info!(
            "resolved: {} package(s), {} system dependencies, {} conflict(s)",
            state.depends.len(),
            state.system_depends.len(),
            state.conflicts.len()
        );
        Ok(state)
    }

    fn run(
        &self,
        mut state: Resolution<'a>,
        mut queue: VecDeque<QueueEntry>,
        deferred: &mut Deferred,
        speculative: bool,
    ) -> Result<Resolution<'a>, CoreError> {
        while let Some(entry) = queue.pop_front() {
            if state.is_classified(&entry.name) {
                continue;
            }

            if let Some(pkg) = self.index.workspace_package(&entry.name) {
                trace!("{} found in workspace", entry.name);
                state
                    .depends
                    .insert(entry.name.clone(), PackageSource::Workspace(pkg));
                enqueue_dependencies(&mut queue, &entry, &pkg.manifest);
                continue;
            }

            let candidates = self.index.remote_candidates(&entry.name);
            let mut reasons = Vec::new();
            if !candidates.is_empty() {
                if let Some(branch) =
                    self.branch(&state, &entry, &candidates, &mut reasons, speculative)?
                {
                    state = branch;
                    continue;
                }
            }

            let had_candidates = !candidates.is_empty();
            self.classify_fallback(&mut state, &entry, had_candidates, reasons, deferred)?;
        }
        Ok(state)
    }

    /// Try every admissible remote candidate for `entry` and return the state of
    /// the chosen branch, or `None` when no candidate is viable.
    ///
    /// Trial runs are speculative and never consult the chooser.
    fn branch(
        &self,
        state: &Resolution<'a>,
        entry: &QueueEntry,
        candidates: &[&'a RemotePackage],
        reasons: &mut Vec<String>,
        speculative: bool,
    ) -> Result<Option<Resolution<'a>>, CoreError> {
        let mut viable: Vec<(&'a RemotePackage, Resolution<'a>)> = Vec::new();

        for &candidate in candidates {
            let Some(project) = self.index.project(&candidate.project) else {
                continue;
            };
            if let Some(reason) = self.rejection(state, project) {
                debug!("{}: {reason}", entry.name);
                reasons.push(reason);
                continue;
            }

            trace!("{}: trying project {}", entry.name, project.id);
            let trial = self.extend(state, entry, candidate, true)?;

            let unresolved: Vec<&PackageName> = trial
                .conflicts
                .keys()
                .filter(|name| !state.conflicts.contains_key(*name))
                .collect();
            if unresolved.is_empty() {
                viable.push((candidate, trial));
            } else {
                let reason = format!(
                    "project '{}' would leave unresolved: {}",
                    project.id,
                    join_names(&unresolved)
                );
                debug!("{}: {reason}", entry.name);
                reasons.push(reason);
            }
        }

        if viable.is_empty() {
            return Ok(None);
        }
        let pick = self.pick(&entry.name, &viable, speculative);
        let (chosen, branch) = viable.swap_remove(pick);
        debug!("{}: using project {}", entry.name, chosen.project);
        if speculative || !self.asks() {
            return Ok(Some(branch));
        }
        // Replay the committed branch so nested ambiguities reach the chooser.
        self.extend(state, entry, chosen, false).map(Some)
    }

    /// `state` plus `candidate` for `entry` and the candidate's dependency closure.
    fn extend(
        &self,
        state: &Resolution<'a>,
        entry: &QueueEntry,
        candidate: &'a RemotePackage,
        speculative: bool,
    ) -> Result<Resolution<'a>, CoreError> {
        let mut next = state.clone();
        next.depends
            .insert(entry.name.clone(), PackageSource::Remote(candidate));
        let mut closure = VecDeque::new();
        enqueue_dependencies(&mut closure, entry, &candidate.manifest);
        // Branch queues never carry root-level entries, so nothing is deferred.
        self.run(next, closure, &mut Deferred::new(), speculative)
    }

    fn asks(&self) -> bool {
        self.chooser.is_some() && !self.options.auto_resolve
    }

    /// Why `project` cannot be cloned given the current state, if it cannot.
    ///
    /// Any package name shared with an already selected project rejects the
    /// candidate, whether or not that name is in `depends`, so no two selected
    /// projects can check out the same package.
    fn rejection(&self, state: &Resolution<'a>, project: &RemoteProject) -> Option<String> {
        if self.index.is_workspace_project(&project.id) {
            return Some(format!(
                "project '{}' is already checked out in the workspace",
                project.id
            ));
        }

        if let Some(sibling) = project
            .package_names()
            .find(|name| self.index.is_workspace_package(name))
        {
            return Some(format!(
                "project '{}' also contains '{sibling}', which is already in the workspace",
                project.id
            ));
        }

        for selected in state.selected_projects() {
            if *selected == project.id {
                continue;
            }
            let Some(other) = self.index.project(selected) else {
                continue;
            };
            if let Some(shared) = project.shared_packages(other).first() {
                return Some(format!(
                    "project '{}' would duplicate '{shared}' from already selected project '{}'",
                    project.id, other.id
                ));
            }
        }

        None
    }

    fn pick(
        &self,
        name: &PackageName,
        viable: &[(&'a RemotePackage, Resolution<'a>)],
        speculative: bool,
    ) -> usize {
        if viable.len() > 1 && !speculative && self.asks() {
            if let Some(chooser) = self.chooser {
                let candidates: Vec<&RemotePackage> = viable.iter().map(|(c, _)| *c).collect();
                match chooser(name, &candidates) {
                    Some(choice) if choice < viable.len() => return choice,
                    Some(choice) => warn!("ignoring out of range choice {choice} for {name}"),
                    None => debug!("no choice made for {name}, picking automatically"),
                }
            }
        }

        // Fewest system fallbacks; the index breaks ties in first-found order.
        viable
            .iter()
            .enumerate()
            .min_by_key(|(pos, (_, branch))| (branch.system_depends.len(), *pos))
            .map_or(0, |(pos, _)| pos)
    }

    fn classify_fallback(
        &self,
        state: &mut Resolution<'a>,
        entry: &QueueEntry,
        had_candidates: bool,
        remote_reasons: Vec<String>,
        deferred: &mut Deferred,
    ) -> Result<(), CoreError> {
        let name = &entry.name;
        let is_system = self.oracle.contains(name)?;

        if is_system && entry.root.is_some() {
            trace!("{name} is a system dependency");
            state.system_depends.insert(name.clone());
            return Ok(());
        }

        let mut reasons = Vec::new();
        if had_candidates {
            reasons.push(format!("'{name}' is not in the workspace"));
            reasons.extend(remote_reasons);
        } else {
            reasons.push(format!(
                "'{name}' is not in the workspace or any remote project"
            ));
        }

        if is_system {
            reasons.push(format!(
                "'{name}' is a system dependency, not a source package, and nothing requires it"
            ));
            deferred.push((name.clone(), reasons));
            return Ok(());
        }

        reasons.push(format!("'{name}' has no system package rule"));
        if let Some(requester) = &entry.requester {
            let mut line = format!("required by '{requester}'");
            if let Some(root) = entry.root.as_ref().filter(|root| *root != requester) {
                let _ = write!(line, " (needed for '{root}')");
            }
            reasons.push(line);
        }
        debug!("{name} cannot be resolved");
        state.conflicts.insert(name.clone(), reasons);
        Ok(())
    }
}

/// Resolve with automatic tie-breaking and no chooser.
pub fn resolve<'a, I, N>(
    requested: I,
    index: &'a PackageIndex,
    oracle: &'a dyn SystemOracle,
) -> Result<Resolution<'a>, CoreError>
where
    I: IntoIterator<Item = N>,
    N: Into<PackageName>,
{
    Resolver::new(index, oracle)
        .with_options(ResolveOptions { auto_resolve: true })
        .resolve(requested)
}

fn enqueue_dependencies(
    queue: &mut VecDeque<QueueEntry>,
    entry: &QueueEntry,
    manifest: &PackageManifest,
) {
    let root = entry.root.clone().unwrap_or_else(|| entry.name.clone());
    for dep in manifest.dependency_names() {
        queue.push_back(QueueEntry {
            root: Some(root.clone()),
            requester: Some(entry.name.clone()),
            name: dep.clone(),
        });
    }
}

fn join_names(names: &[&PackageName]) -> String {
    names
        .iter()
        .map(|n| n.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

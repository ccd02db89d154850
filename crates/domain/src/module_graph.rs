use std::collections::{BTreeMap, BTreeSet, HashMap};

use modgate_core::{AppError, AppResult, ModuleId};

use crate::{Action, Module, PermissionConflict, PermissionMap};

/// Module definitions plus their dependency edges.
///
/// The graph itself is a plain value: mutations produce a prospective graph
/// that callers validate before committing it anywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleGraph {
    modules: BTreeMap<ModuleId, Module>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitMark {
    InProgress,
    Done,
}

impl ModuleGraph {
    /// Builds a graph, rejecting duplicate module ids.
    pub fn new(modules: impl IntoIterator<Item = Module>) -> AppResult<Self> {
        let mut indexed = BTreeMap::new();
        for module in modules {
            let id = module.id().clone();
            if indexed.insert(id.clone(), module).is_some() {
                return Err(AppError::Validation(format!(
                    "module '{id}' is defined more than once"
                )));
            }
        }

        Ok(Self { modules: indexed })
    }

    /// Returns a module by id.
    #[must_use]
    pub fn get(&self, module_id: &str) -> Option<&Module> {
        self.modules.get(module_id)
    }

    /// Returns whether the module exists.
    #[must_use]
    pub fn contains(&self, module_id: &str) -> bool {
        self.modules.contains_key(module_id)
    }

    /// Returns the number of modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns whether the graph holds no modules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Iterates modules ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    /// Returns modules ordered by display order, then id.
    #[must_use]
    pub fn modules_in_display_order(&self) -> Vec<&Module> {
        let mut ordered: Vec<&Module> = self.modules.values().collect();
        ordered.sort_by(|left, right| {
            left.order()
                .cmp(&right.order())
                .then_with(|| left.id().cmp(right.id()))
        });
        ordered
    }

    /// Returns modules that list `module_id` as a direct dependency.
    #[must_use]
    pub fn dependents_of(&self, module_id: &str) -> Vec<&ModuleId> {
        self.modules
            .values()
            .filter(|module| module.dependencies().contains(module_id))
            .map(Module::id)
            .collect()
    }

    /// Returns a copy of the graph with the module inserted or replaced.
    #[must_use]
    pub fn with_module(&self, module: Module) -> Self {
        let mut modules = self.modules.clone();
        modules.insert(module.id().clone(), module);
        Self { modules }
    }

    /// Returns a copy of the graph without the module plus the removed
    /// module, or `None` when absent.
    #[must_use]
    pub fn without_module(&self, module_id: &str) -> Option<(Self, Module)> {
        let mut modules = self.modules.clone();
        let removed = modules.remove(module_id)?;
        Some((Self { modules }, removed))
    }

    /// Checks dependency edges and acyclicity.
    ///
    /// Edges to unknown modules yield `missing_dependency` conflicts. Each
    /// distinct cycle yields one `circular_dependency` conflict whose member
    /// list starts at the lexicographically smallest id in the cycle.
    #[must_use]
    pub fn validate(&self) -> Vec<PermissionConflict> {
        let mut conflicts = Vec::new();

        for module in self.modules.values() {
            for dependency in module.dependencies() {
                if !self.contains(dependency.as_str()) {
                    conflicts.push(PermissionConflict::unknown_dependency(
                        dependency,
                        module.id(),
                    ));
                }
            }
        }

        conflicts.extend(
            self.find_cycles()
                .into_iter()
                .map(PermissionConflict::circular_dependency),
        );

        conflicts
    }

    /// Returns every module reachable through dependency edges, excluding the
    /// module itself unless it sits on a cycle.
    ///
    /// Edges to unknown modules are included but not expanded.
    #[must_use]
    pub fn transitive_dependencies(&self, module_id: &str) -> BTreeSet<ModuleId> {
        let mut reached = BTreeSet::new();
        let mut pending: Vec<&ModuleId> = self
            .modules
            .get(module_id)
            .map(|module| module.dependencies().iter().collect())
            .unwrap_or_default();

        while let Some(next) = pending.pop() {
            if !reached.insert(next.clone()) {
                continue;
            }
            if let Some(module) = self.modules.get(next.as_str()) {
                pending.extend(module.dependencies().iter());
            }
        }

        reached
    }

    /// Returns whether every transitive dependency of the module is present in
    /// `granted_modules`.
    #[must_use]
    pub fn dependencies_satisfied(
        &self,
        module_id: &str,
        granted_modules: &BTreeSet<ModuleId>,
    ) -> bool {
        self.transitive_dependencies(module_id)
            .iter()
            .all(|dependency| granted_modules.contains(dependency))
    }

    /// Checks that every module with any action has `view` on all of its
    /// transitive dependencies.
    ///
    /// Modules unknown to the graph are skipped; dangling references are
    /// reported by the resolver and the bulk coordinator.
    #[must_use]
    pub fn dependency_conflicts(&self, permissions: &PermissionMap) -> Vec<PermissionConflict> {
        let viewable = permissions.modules_with(Action::View);
        let mut conflicts = Vec::new();

        for module_id in permissions.granted_modules() {
            if !self.contains(module_id.as_str()) {
                continue;
            }

            for dependency in self.transitive_dependencies(module_id.as_str()) {
                if dependency != module_id && !viewable.contains(&dependency) {
                    conflicts.push(PermissionConflict::missing_dependency(
                        &dependency,
                        &module_id,
                    ));
                }
            }
        }

        conflicts
    }

    fn find_cycles(&self) -> BTreeSet<Vec<ModuleId>> {
        let mut marks: HashMap<&ModuleId, VisitMark> = HashMap::new();
        let mut cycles = BTreeSet::new();

        for start in self.modules.keys() {
            if marks.contains_key(start) {
                continue;
            }

            marks.insert(start, VisitMark::InProgress);
            let mut path: Vec<&ModuleId> = vec![start];
            let mut frontier = vec![self.direct_dependencies(start)];

            loop {
                let next = match frontier.last_mut() {
                    Some(edges) => edges.next(),
                    None => break,
                };

                let Some(next) = next else {
                    frontier.pop();
                    if let Some(finished) = path.pop() {
                        marks.insert(finished, VisitMark::Done);
                    }
                    continue;
                };

                if !self.modules.contains_key(next.as_str()) {
                    continue;
                }

                match marks.get(next) {
                    Some(VisitMark::InProgress) => {
                        if let Some(position) = path.iter().position(|member| *member == next) {
                            cycles.insert(canonical_cycle(&path[position..]));
                        }
                    }
                    Some(VisitMark::Done) => {}
                    None => {
                        marks.insert(next, VisitMark::InProgress);
                        path.push(next);
                        frontier.push(self.direct_dependencies(next));
                    }
                }
            }
        }

        cycles
    }

    fn direct_dependencies(
        &self,
        module_id: &ModuleId,
    ) -> std::collections::btree_set::Iter<'_, ModuleId> {
        match self.modules.get(module_id.as_str()) {
            Some(module) => module.dependencies().iter(),
            None => EMPTY_DEPENDENCIES.iter(),
        }
    }
}

static EMPTY_DEPENDENCIES: BTreeSet<ModuleId> = BTreeSet::new();

fn canonical_cycle(members: &[&ModuleId]) -> Vec<ModuleId> {
    let start = members
        .iter()
        .enumerate()
        .min_by(|(_, left), (_, right)| left.cmp(right))
        .map(|(index, _)| index)
        .unwrap_or(0);

    members[start..]
        .iter()
        .chain(members[..start].iter())
        .map(|member| (*member).clone())
        .collect()
}

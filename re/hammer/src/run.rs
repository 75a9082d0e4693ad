use core::fmt;

use itertools::Itertools;
use prjsense_re_collector::{Collector, Correlation, Diff};
use prjsense_tiledb::Database;
use prjsense_types::{ConfigImage, SenseDb};
use unnamed_entity::EntityId;

use crate::{
    ActiveSet, Backend, Error,
    job::{Job, JobSpec},
    netdir::{DirectionMap, HeuristicTable, classify},
    probe::{NetMap, enumerate_targets, plan},
};

pub struct Session<'a, B: Backend> {
    backend: &'a B,
    db: &'a Database,
    heuristics: &'a HeuristicTable,
    pub debug: u8,
}

/// Result of fuzzing one job. Nothing has been written to a store yet.
#[derive(Debug)]
pub struct JobOutcome {
    pub correlation: Correlation,
    pub directions: DirectionMap,
    pub derivations: usize,
    /// Bits that moved for a lone group member but not for the whole group.
    pub gated: usize,
}

impl<'a, B: Backend> Session<'a, B> {
    pub fn new(backend: &'a B, db: &'a Database, heuristics: &'a HeuristicTable) -> Self {
        Session {
            backend,
            db,
            heuristics,
            debug: 0,
        }
    }

    fn derive(
        &self,
        job: &Job,
        target: &str,
        active: &ActiveSet,
        count: &mut usize,
    ) -> Result<ConfigImage, Error> {
        if self.debug >= 2 {
            eprintln!(
                "{}: deriving {target} [{}]",
                job.prefix(),
                active.iter().join(" ")
            );
        }
        *count += 1;
        self.backend
            .derive_image(job.tiles(), active)
            .map_err(|source| Error::Derivation {
                target: target.to_string(),
                source,
            })
    }

    /// Fuzzes every probe target of `job` in enumeration order.
    pub fn run_job(&self, job: &Job) -> Result<JobOutcome, Error> {
        let Some(dev) = self.db.device(job.family(), job.part()) else {
            return Err(Error::configuration(format!(
                "unknown device {} {}",
                job.family(),
                job.part()
            )));
        };
        if self.debug >= 1 {
            eprintln!(
                "{}: starting job on {} with {} nets in {} tiles",
                job.prefix(),
                job.part(),
                job.num_nets(),
                job.tiles().len()
            );
        }
        let dirs = classify(job.nets(), job.overrides(), self.heuristics);
        if self.debug >= 3 {
            for (net, dir, prov) in dirs.iter() {
                eprintln!("{}: {net} is {dir} ({prov:?})", job.prefix());
            }
        }
        let netmap = NetMap::build(dev, job)?;
        if self.debug >= 3 {
            for (tile, nets) in netmap.by_tile() {
                eprintln!("{}: {tile}: {}", job.prefix(), nets.join(" "));
            }
        }
        let targets = enumerate_targets(job);
        let mut derivations = 0;
        let base = self.derive(job, "<baseline>", &ActiveSet::new(), &mut derivations)?;
        let mut collector = Collector::new(job.prefix());
        let mut gated = 0;
        for (tid, target) in &targets {
            // The first perturbation holds every member active. Every diff is
            // against the same baseline, so the union never disagrees on a
            // bit's value.
            let mut acc: Option<Diff> = None;
            for active in plan(target, &dirs) {
                let image = self.derive(job, &target.name, &active, &mut derivations)?;
                let diff = Diff::between(&base, &image, job.tiles());
                match &mut acc {
                    None => acc = Some(diff),
                    Some(all) => {
                        let (_, only_member, _) = Diff::split(all.clone(), diff);
                        for bit in only_member.bits.keys() {
                            eprintln!(
                                "{}: GATED bit {bit} of {} moves for [{}] alone but not for the whole group",
                                job.prefix(),
                                target.name,
                                active.iter().join(" ")
                            );
                            gated += 1;
                        }
                        all.bits.extend(only_member.bits);
                    }
                }
            }
            let acc = acc.unwrap_or_default();
            if self.debug >= 3 {
                let candidates = netmap.candidates(target.members.iter().map(|x| x.as_str()));
                let mut outside = acc.clone();
                outside.split_bits(&candidates);
                eprintln!(
                    "{}: target {idx} {name}: {acc:?}",
                    job.prefix(),
                    idx = tid.to_idx(),
                    name = target.name
                );
                if !outside.is_empty() {
                    eprintln!("{}: bits outside candidates: {outside:?}", job.prefix());
                }
            }
            if acc.is_empty() {
                eprintln!(
                    "{}: WARNING: target {} changed no bits",
                    job.prefix(),
                    target.name
                );
            }
            collector.insert(target.name.clone(), target.members.clone(), acc);
        }
        let correlation = collector.finish();
        for amb in &correlation.ambiguities {
            eprintln!("AMBIGUOUS {amb}");
        }
        if self.debug >= 1 {
            eprintln!(
                "{}: done, {} records, {} ambiguous bits, {derivations} derivations",
                job.prefix(),
                correlation.records.len(),
                correlation.ambiguities.len()
            );
        }
        Ok(JobOutcome {
            correlation,
            directions: dirs,
            derivations,
            gated,
        })
    }

    /// Validates, runs and commits one job. Errors stay confined to the job.
    pub fn run_spec(&self, spec: JobSpec, store: &mut SenseDb) -> Result<JobStats, Error> {
        let job = Job::new(self.db, spec)?;
        let outcome = self.run_job(&job)?;
        outcome.correlation.commit(store)?;
        Ok(JobStats {
            records: outcome.correlation.records.len(),
            ambiguous: outcome.correlation.ambiguities.len(),
            derivations: outcome.derivations,
            gated: outcome.gated,
        })
    }

    /// Runs the given jobs in order, one at a time. A failing job is reported
    /// and skipped; records of jobs that succeeded stay in `store`.
    pub fn run_jobs(
        &self,
        jobs: impl IntoIterator<Item = (usize, JobSpec)>,
        store: &mut SenseDb,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        for (index, spec) in jobs {
            let prefix = spec.prefix.clone();
            let result = self.run_spec(spec, store);
            if let Err(e) = &result {
                eprintln!("job {index} ({prefix}) failed: {e}");
            }
            summary.jobs.push(JobReport {
                index,
                prefix,
                result,
            });
        }
        summary
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct JobStats {
    pub records: usize,
    pub ambiguous: usize,
    pub derivations: usize,
    pub gated: usize,
}

#[derive(Debug)]
pub struct JobReport {
    pub index: usize,
    pub prefix: String,
    pub result: Result<JobStats, Error>,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub jobs: Vec<JobReport>,
}

impl RunSummary {
    pub fn failed(&self) -> bool {
        self.jobs.iter().any(|j| j.result.is_err())
    }

    pub fn num_ambiguous(&self) -> usize {
        self.jobs
            .iter()
            .filter_map(|j| j.result.as_ref().ok())
            .map(|s| s.ambiguous)
            .sum()
    }

    pub fn exit_code(&self) -> i32 {
        if self.failed() { 1 } else { 0 }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for job in &self.jobs {
            match &job.result {
                Ok(stats) => writeln!(
                    f,
                    "job {idx} {prefix}: ok, {rec} records, {amb} ambiguous bits",
                    idx = job.index,
                    prefix = job.prefix,
                    rec = stats.records,
                    amb = stats.ambiguous
                )?,
                Err(e) => writeln!(
                    f,
                    "job {idx} {prefix}: FAILED [{kind}] {e}",
                    idx = job.index,
                    prefix = job.prefix,
                    kind = e.kind()
                )?,
            }
        }
        let failed = self.jobs.iter().filter(|j| j.result.is_err()).count();
        write!(
            f,
            "{n} jobs, {failed} failed, {amb} ambiguous bits",
            n = self.jobs.len(),
            amb = self.num_ambiguous()
        )
    }
}

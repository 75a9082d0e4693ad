//! Campaign files: the database to use, naming heuristics, and a numbered
//! table of fuzzing jobs.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};

use prjsense_re_hammer::{
    Backend, DirectionOverrides, Error, HeuristicTable, JobReport, JobSpec, NetPolicy,
    RunSummary, Session,
};
use prjsense_types::{Direction, SenseDb, TileCoord};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct NetDirRule {
    pub pattern: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CampaignJob {
    #[serde(default)]
    pub name: Option<String>,
    pub family: String,
    pub device: String,
    pub tiles: Vec<TileCoord>,
    /// Net names; `@set` expands to a named set from the `[nets]` table.
    pub nets: Vec<String>,
    pub prefix: String,
    #[serde(default)]
    pub union: bool,
    #[serde(default)]
    pub default_direction: Option<Direction>,
    #[serde(default)]
    pub overrides: BTreeMap<String, Direction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Campaign {
    pub database: PathBuf,
    #[serde(default)]
    pub netdir: Vec<NetDirRule>,
    #[serde(default)]
    pub nets: BTreeMap<String, Vec<String>>,
    #[serde(default, rename = "job")]
    pub jobs: Vec<CampaignJob>,
}

impl Campaign {
    /// Loads a campaign. A relative database path is taken relative to the
    /// campaign file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn StdError>> {
        let path = path.as_ref();
        let mut res = Self::from_toml(&read_to_string(path)?)?;
        if res.database.is_relative() {
            if let Some(dir) = path.parent() {
                res.database = dir.join(&res.database);
            }
        }
        Ok(res)
    }

    pub fn from_toml(s: &str) -> Result<Self, Box<dyn StdError>> {
        Ok(toml::from_str(s)?)
    }

    pub fn heuristics(&self) -> Result<HeuristicTable, Error> {
        HeuristicTable::from_rules(
            self.netdir
                .iter()
                .map(|rule| (rule.pattern.as_str(), rule.direction)),
        )
    }

    fn expand_nets(&self, nets: &[String]) -> Result<Vec<String>, Error> {
        let mut res = vec![];
        for net in nets {
            if let Some(set) = net.strip_prefix('@') {
                let Some(members) = self.nets.get(set) else {
                    return Err(Error::configuration(format!("unknown net set @{set}")));
                };
                res.extend(members.iter().cloned());
            } else {
                res.push(net.clone());
            }
        }
        Ok(res)
    }

    pub fn job_spec(&self, index: usize) -> Result<JobSpec, Error> {
        let Some(job) = self.jobs.get(index) else {
            return Err(Error::configuration(format!(
                "no job with index {index} (campaign has {n})",
                n = self.jobs.len()
            )));
        };
        Ok(JobSpec {
            family: job.family.clone(),
            part: job.device.clone(),
            tiles: job.tiles.clone(),
            nets: self.expand_nets(&job.nets)?,
            prefix: job.prefix.clone(),
            policy: if job.union {
                NetPolicy::Union
            } else {
                NetPolicy::PerNet
            },
            overrides: DirectionOverrides {
                nets: job.overrides.clone(),
                default: job.default_direction,
            },
        })
    }

    /// Job indices to run: all jobs when none are given, otherwise the given
    /// ones in index order.
    pub fn selection(&self, ids: &[usize]) -> Vec<usize> {
        if ids.is_empty() {
            return (0..self.jobs.len()).collect();
        }
        let mut res = ids.to_vec();
        res.sort_unstable();
        res.dedup();
        res
    }

    /// Runs the selected jobs one after another. Jobs that cannot even be
    /// built from the campaign are reported as failed and skipped.
    pub fn run<B: Backend>(
        &self,
        session: &Session<'_, B>,
        ids: &[usize],
        store: &mut SenseDb,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        for index in self.selection(ids) {
            if let Some(name) = self.jobs.get(index).and_then(|j| j.name.as_deref()) {
                println!("job {index} {name}");
            }
            match self.job_spec(index) {
                Ok(spec) => summary
                    .jobs
                    .extend(session.run_jobs([(index, spec)], store).jobs),
                Err(e) => {
                    eprintln!("job {index} failed: {e}");
                    summary.jobs.push(JobReport {
                        index,
                        prefix: self
                            .jobs
                            .get(index)
                            .map_or_else(|| "-".to_string(), |j| j.prefix.clone()),
                        result: Err(e),
                    });
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const CAMPAIGN: &str = r#"
        database = "machxo2.json"

        [[netdir]]
        pattern = '_CLKO\d*_DCC$'
        direction = "source"

        [nets]
        eclk-out = ["R6C13_CLKO0_DCC", "R6C13_CLKO1_DCC"]

        [[job]]
        name = "GLOBAL_FIXED"
        family = "MachXO2"
        device = "LCMXO2-1200HC"
        tiles = ["CENTER6:CENTER_EBR_CIB", "CENTER9:CENTER8"]
        nets = ["@eclk-out", "R6C13_JCE0_DCC"]
        prefix = "1200_"
        default-direction = "sink"

        [[job]]
        family = "MachXO2"
        device = "LCMXO2-1200HC"
        tiles = ["CENTER6:CENTER_EBR_CIB"]
        nets = ["R6C13_CLKI0_DCC", "R6C13_CLKO0_DCC", "R6C13_JCE0_DCC"]
        prefix = "jce_"
        union = true
        overrides = { R6C13_JCE0_DCC = "sink" }

        [[job]]
        family = "MachXO2"
        device = "LCMXO2-1200HC"
        tiles = ["CENTER6:CENTER_EBR_CIB"]
        nets = ["@nope"]
        prefix = "bad_"
    "#;

    #[test]
    fn test_parse() {
        let c = Campaign::from_toml(CAMPAIGN).unwrap();
        assert_eq!(c.jobs.len(), 3);
        let t = c.heuristics().unwrap();
        assert_eq!(t.lookup("R6C13_CLKO1_DCC"), Some((0, Direction::Source)));

        let spec = c.job_spec(0).unwrap();
        assert_eq!(
            spec.nets,
            ["R6C13_CLKO0_DCC", "R6C13_CLKO1_DCC", "R6C13_JCE0_DCC"]
        );
        assert_eq!(spec.part, "LCMXO2-1200HC");
        assert_eq!(spec.tiles[1].to_string(), "CENTER9:CENTER8");
        assert_eq!(spec.policy, NetPolicy::PerNet);
        assert_eq!(spec.overrides.default, Some(Direction::Sink));

        let spec = c.job_spec(1).unwrap();
        assert_eq!(spec.policy, NetPolicy::Union);
        assert_eq!(spec.overrides.default, None);
        assert_eq!(spec.overrides.nets["R6C13_JCE0_DCC"], Direction::Sink);

        assert_matches!(c.job_spec(2), Err(Error::Configuration(_)));
        assert_matches!(c.job_spec(3), Err(Error::Configuration(_)));
    }

    #[test]
    fn test_selection() {
        let c = Campaign::from_toml(CAMPAIGN).unwrap();
        assert_eq!(c.selection(&[]), [0, 1, 2]);
        assert_eq!(c.selection(&[2, 0, 2, 7]), [0, 2, 7]);
    }

    #[test]
    fn test_bad_campaigns() {
        assert!(Campaign::from_toml("jobs = []").is_err());
        assert!(
            Campaign::from_toml(
                r#"
                database = "x.json"
                [[job]]
                family = "MachXO2"
                device = "LCMXO2-1200HC"
                tiles = ["CENTER6"]
                nets = ["A"]
                prefix = "p_"
                "#
            )
            .is_err()
        );
        let c = Campaign::from_toml(
            r#"
            database = "x.json"
            [[netdir]]
            pattern = "("
            direction = "sink"
            "#,
        )
        .unwrap();
        assert_matches!(c.heuristics(), Err(Error::Configuration(_)));
    }

    #[test]
    fn test_relative_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("campaign.toml");
        std::fs::write(&path, CAMPAIGN).unwrap();
        let c = Campaign::from_file(&path).unwrap();
        assert_eq!(c.database, dir.path().join("machxo2.json"));
    }
}

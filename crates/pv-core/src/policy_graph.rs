//! Finite-state controller view of a value function.
//!
//! Each node is an alpha vector of the current epoch; its successor for
//! observation z is the previous-epoch vector its Q-vector was built from.
//!
//! File format, one line per node:
//!
//! ```text
//! <id> <action>  <next_0> <next_1> ... <next_{Z-1}>
//! ```
//!
//! A successor is a node id, `X` when the observation cannot occur, or `-`
//! when no successor is known.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::alpha::{AlphaList, NodeHandle};
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};

#[derive(Debug, Error)]
pub enum PolicyGraphError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("line {line}: {message}")]
    Format { line: usize, message: String },

    #[error("line {line}: action {action} out of range for {num_actions} actions")]
    ActionOutOfRange {
        line: usize,
        action: usize,
        num_actions: usize,
    },

    #[error("line {line}: node {id} links to unknown node {target} on observation {obs}")]
    DanglingLink {
        line: usize,
        id: i64,
        obs: usize,
        target: i64,
    },

    #[error("observation source {handle} of node {id} does not resolve")]
    StaleHandle { id: i64, handle: NodeHandle },
}

impl From<PolicyGraphError> for pv_common::Error {
    fn from(err: PolicyGraphError) -> Self {
        match err {
            PolicyGraphError::Io(e) => pv_common::Error::Io(e),
            PolicyGraphError::Format { line, message } => {
                pv_common::Error::PolicyGraphFormat { line, message }
            }
            PolicyGraphError::ActionOutOfRange { line, .. }
            | PolicyGraphError::DanglingLink { line, .. } => pv_common::Error::PolicyGraphFormat {
                line,
                message: err.to_string(),
            },
            PolicyGraphError::StaleHandle { .. } => pv_common::Error::StaleHandle(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, PolicyGraphError>;

/// Successor entry for one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgLink {
    Node(i64),
    /// The observation cannot occur after this node's action.
    Impossible,
    /// No successor recorded.
    Unknown,
}

impl fmt::Display for PgLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PgLink::Node(id) => write!(f, "{id}"),
            PgLink::Impossible => write!(f, "X"),
            PgLink::Unknown => write!(f, "-"),
        }
    }
}

impl FromStr for PgLink {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "X" => Ok(PgLink::Impossible),
            "-" => Ok(PgLink::Unknown),
            other => other
                .parse::<i64>()
                .map(PgLink::Node)
                .map_err(|_| format!("bad successor '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgNode {
    pub id: i64,
    pub action: usize,
    pub next: Vec<PgLink>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyGraph {
    pub nodes: Vec<PgNode>,
    pub num_observations: usize,
}

impl PolicyGraph {
    /// Build the graph for `current`, whose observation sources point into
    /// `previous`.
    pub fn from_lists(
        current: &AlphaList,
        previous: &AlphaList,
        num_observations: usize,
    ) -> Result<Self> {
        let mut nodes = Vec::with_capacity(current.len());
        for node in current.iter() {
            let next = match node.provenance.obs_source() {
                None => vec![PgLink::Unknown; num_observations],
                Some(slots) => {
                    let mut next = Vec::with_capacity(num_observations);
                    for z in 0..num_observations {
                        let link = match slots.get(z).copied().flatten() {
                            None => PgLink::Impossible,
                            Some(handle) => {
                                let target = previous.get(handle).ok_or(
                                    PolicyGraphError::StaleHandle {
                                        id: node.id,
                                        handle,
                                    },
                                )?;
                                PgLink::Node(target.id)
                            }
                        };
                        next.push(link);
                    }
                    next
                }
            };
            nodes.push(PgNode {
                id: node.id,
                action: node.action,
                next,
            });
        }
        Ok(PolicyGraph {
            nodes,
            num_observations,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        for node in &self.nodes {
            write!(writer, "{} {}  ", node.id, node.action)?;
            for link in &node.next {
                write!(writer, "{link} ")?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        self.write(&mut file)?;
        file.flush()?;
        Ok(())
    }

    /// Parse a policy graph. Blank lines are skipped.
    ///
    /// With `num_actions` set, every action is range checked.
    pub fn read<R: BufRead>(
        reader: R,
        num_observations: usize,
        num_actions: Option<usize>,
    ) -> Result<Self> {
        let mut nodes = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let lineno = index + 1;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }
            if tokens.len() != num_observations + 2 {
                return Err(PolicyGraphError::Format {
                    line: lineno,
                    message: format!(
                        "expected {} fields, found {}",
                        num_observations + 2,
                        tokens.len()
                    ),
                });
            }
            let id = tokens[0].parse::<i64>().map_err(|_| PolicyGraphError::Format {
                line: lineno,
                message: format!("bad node id '{}'", tokens[0]),
            })?;
            let action = tokens[1].parse::<usize>().map_err(|_| PolicyGraphError::Format {
                line: lineno,
                message: format!("bad action '{}'", tokens[1]),
            })?;
            if let Some(num_actions) = num_actions {
                if action >= num_actions {
                    return Err(PolicyGraphError::ActionOutOfRange {
                        line: lineno,
                        action,
                        num_actions,
                    });
                }
            }
            let next = tokens[2..]
                .iter()
                .map(|t| t.parse::<PgLink>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|message| PolicyGraphError::Format {
                    line: lineno,
                    message,
                })?;
            nodes.push(PgNode { id, action, next });
        }
        Ok(PolicyGraph {
            nodes,
            num_observations,
        })
    }

    pub fn load(path: &Path, num_observations: usize, num_actions: Option<usize>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::read(BufReader::new(file), num_observations, num_actions)
    }

    /// Check that every numeric successor names a node of this graph.
    pub fn verify(&self) -> Result<()> {
        let ids: HashSet<i64> = self.nodes.iter().map(|n| n.id).collect();
        for (index, node) in self.nodes.iter().enumerate() {
            for (obs, link) in node.next.iter().enumerate() {
                if let PgLink::Node(target) = *link {
                    if !ids.contains(&target) {
                        return Err(PolicyGraphError::DanglingLink {
                            line: index + 1,
                            id: node.id,
                            obs,
                            target,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Rewrite successor ids from `previous` to the matching vectors of
    /// `current`, turning the graph into a closed controller once the value
    /// function has converged.
    ///
    /// Successors with no matching vector become `-`. Returns how many.
    pub fn relink(
        &mut self,
        previous: &AlphaList,
        current: &AlphaList,
        epsilon: f64,
        ctx: &LogContext,
    ) -> usize {
        let mapping: HashMap<i64, i64> = previous
            .iter()
            .filter_map(|node| {
                current
                    .find(&node.alpha, epsilon)
                    .and_then(|h| current.get(h))
                    .map(|target| (node.id, target.id))
            })
            .collect();

        let mut unmatched = 0;
        for node in &mut self.nodes {
            for link in &mut node.next {
                if let PgLink::Node(id) = *link {
                    *link = match mapping.get(&id) {
                        Some(&new_id) => PgLink::Node(new_id),
                        None => {
                            unmatched += 1;
                            PgLink::Unknown
                        }
                    };
                }
            }
        }
        if unmatched > 0 {
            log_event!(
                ctx,
                WARN,
                event_names::POLICY_GRAPH_RELINK,
                Stage::Io,
                "successors without a matching vector",
                unmatched = unmatched as u64
            );
        }
        unmatched
    }
}

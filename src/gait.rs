use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// First keyframe of the repeating cycle; index 0 is the rest pose, played
/// only when walking starts.
pub const LOOP_START: usize = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct Keyframe {
    pub label: String,
    pub angles: Vec<f64>,
}

impl Keyframe {
    pub fn new(label: &str, angles: &[f64]) -> Self {
        Keyframe {
            label: label.to_string(),
            angles: angles.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GaitStep {
    Pose(Keyframe),
    LoopPoint,
}

// On-disk step, as exported by the operator console.
#[derive(Debug, Deserialize)]
struct StepRecord {
    name: String,
    #[serde(default)]
    angles: Option<Vec<f64>>,
}

#[derive(Debug, Error, PartialEq)]
pub enum GaitError {
    #[error("gait table has no loop point")]
    MissingLoopPoint,
    #[error("loop point at step {position} is not the last step")]
    LoopPointNotLast { position: usize },
    #[error("gait table needs a rest pose and at least one cyclic keyframe")]
    NoCycle,
    #[error("failed to read gait file: {0}")]
    Io(String),
    #[error("failed to parse gait file: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GaitTable {
    steps: Vec<GaitStep>,
}

impl GaitTable {
    pub fn new(steps: Vec<GaitStep>) -> Result<Self, GaitError> {
        let position = steps
            .iter()
            .position(|step| *step == GaitStep::LoopPoint)
            .ok_or(GaitError::MissingLoopPoint)?;

        if position != steps.len() - 1 {
            return Err(GaitError::LoopPointNotLast { position });
        }
        if position <= LOOP_START {
            return Err(GaitError::NoCycle);
        }

        Ok(GaitTable { steps })
    }

    pub fn load(path: &Path) -> Result<Self, GaitError> {
        let content = fs::read_to_string(path).map_err(|e| GaitError::Io(e.to_string()))?;
        Self::from_json(&content)
    }

    /// Parses `[{"name": .., "angles": [..]}, .., {"name": "end"}]`.
    pub fn from_json(content: &str) -> Result<Self, GaitError> {
        let records: Vec<StepRecord> =
            serde_json::from_str(content).map_err(|e| GaitError::Parse(e.to_string()))?;

        let steps = records
            .into_iter()
            .map(|record| match record.angles {
                Some(angles) => GaitStep::Pose(Keyframe {
                    label: record.name,
                    angles,
                }),
                None => GaitStep::LoopPoint,
            })
            .collect();
        Self::new(steps)
    }

    pub fn get(&self, index: usize) -> Option<&GaitStep> {
        self.steps.get(index)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Default for GaitTable {
    /// Tripod-style walk: lift, swing, plant, push, repeated on all legs.
    fn default() -> Self {
        let pose = |label: &str, angles: [f64; 12]| GaitStep::Pose(Keyframe::new(label, &angles));
        GaitTable {
            steps: vec![
                pose("Base", [90., 0., 90., 0., 90., 0., 90., 0., 90., 0., 90., 0.]),
                pose("Step 1", [90., 0., 90., 60., 90., 0., 90., 60., 90., 0., 90., 60.]),
                pose("Step 2", [90., 0., 60., 60., 90., 0., 60., 60., 90., 0., 60., 60.]),
                pose("Step 3", [90., 0., 60., 0., 90., 0., 60., 0., 90., 0., 60., 0.]),
                pose("Step 4", [90., 60., 60., 0., 90., 60., 60., 0., 90., 60., 60., 0.]),
                pose("Step 5", [90., 60., 90., 0., 90., 60., 90., 0., 90., 60., 90., 0.]),
                pose("Step 6", [60., 60., 90., 0., 60., 60., 90., 0., 60., 60., 90., 0.]),
                pose("Step 7", [60., 0., 90., 0., 60., 0., 90., 0., 60., 0., 90., 0.]),
                pose("Step 8", [60., 0., 90., 60., 60., 0., 90., 60., 60., 0., 90., 60.]),
                GaitStep::LoopPoint,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
}

/// What a single tick asks the caller to do.
#[derive(Debug, PartialEq)]
pub enum Tick<'a> {
    Idle,
    Pose(&'a Keyframe),
    LoopBack,
}

/// Plays a gait table one step per tick. Timing is owned by the caller.
#[derive(Debug)]
pub struct GaitSequencer {
    table: GaitTable,
    phase: Phase,
    cursor: usize,
}

impl GaitSequencer {
    pub fn new(table: GaitTable) -> Self {
        GaitSequencer {
            table,
            phase: Phase::Idle,
            cursor: 0,
        }
    }

    /// Starts (or restarts) playback from the rest pose.
    pub fn start(&mut self) {
        if self.phase == Phase::Running {
            debug!("Restarting gait from the rest pose");
        }
        self.cursor = 0;
        self.phase = Phase::Running;
    }

    pub fn stop(&mut self) {
        self.phase = Phase::Idle;
    }

    pub fn tick(&mut self) -> Tick<'_> {
        if self.phase == Phase::Idle {
            return Tick::Idle;
        }

        match self.table.get(self.cursor) {
            Some(GaitStep::Pose(keyframe)) => {
                debug!("Gait step {} ({})", self.cursor, keyframe.label);
                self.cursor += 1;
                Tick::Pose(keyframe)
            }
            // The table always ends in a loop point, so running past it
            // cannot happen; treat it the same way.
            Some(GaitStep::LoopPoint) | None => {
                self.cursor = LOOP_START;
                Tick::LoopBack
            }
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

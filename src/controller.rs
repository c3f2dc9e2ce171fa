use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::bus::ServoBus;
use crate::command::{self, Command};
use crate::error::RobotError;
use crate::gait::Phase;
use crate::robot::Robot;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(200);

struct State<B: ServoBus> {
    robot: Robot<B>,
    next_tick: Option<Instant>,
    shutdown: bool,
}

struct Shared<B: ServoBus> {
    state: Mutex<State<B>>,
    wake: Condvar,
    interval: Duration,
    control_loop: Mutex<Option<JoinHandle<()>>>,
}

impl<B: ServoBus> Shared<B> {
    fn lock(&self) -> MutexGuard<'_, State<B>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared handle to a running robot.
///
/// Commands and gait ticks go through the same lock, so a pose is always
/// written in full before anything else touches the servos.
pub struct RobotController<B: ServoBus + 'static> {
    shared: Arc<Shared<B>>,
}

impl<B: ServoBus + 'static> Clone for RobotController<B> {
    fn clone(&self) -> Self {
        RobotController {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B: ServoBus + 'static> RobotController<B> {
    /// Starts the control loop thread that plays the gait every `interval`.
    pub fn spawn(robot: Robot<B>, interval: Duration) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                robot,
                next_tick: None,
                shutdown: false,
            }),
            wake: Condvar::new(),
            interval,
            control_loop: Mutex::new(None),
        });

        let loop_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("control-loop".to_string())
            .spawn(move || control_loop(loop_shared))?;
        *shared
            .control_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);

        info!("Control loop started, gait tick every {:?}", interval);
        Ok(RobotController { shared })
    }

    /// Decodes and applies one message from the operator channel.
    pub fn handle_message(&self, text: &str) -> Result<(), RobotError> {
        let command = Command::decode(text)?;
        self.handle(command)
    }

    pub fn handle(&self, command: Command) -> Result<(), RobotError> {
        let mut state = self.shared.lock();
        let restart = command == Command::Walk;
        let result = command::dispatch(&mut state.robot, command);

        // Cleared under the lock: once this returns no further tick can fire.
        if state.robot.sequencer().phase() == Phase::Idle {
            state.next_tick = None;
        } else if restart {
            state.next_tick = Some(Instant::now() + self.shared.interval);
        }
        self.shared.wake.notify_all();
        result
    }

    /// Runs `f` against the robot while holding the lock.
    pub fn with_robot<R>(&self, f: impl FnOnce(&Robot<B>) -> R) -> R {
        f(&self.shared.lock().robot)
    }

    pub fn current_pose(&self) -> Vec<f64> {
        self.with_robot(|robot| robot.bank().current_pose())
    }

    pub fn phase(&self) -> Phase {
        self.with_robot(|robot| robot.sequencer().phase())
    }

    /// Stops the control loop and waits for it to exit.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.lock();
            state.shutdown = true;
            state.next_tick = None;
            self.shared.wake.notify_all();
        }

        let handle = self
            .shared
            .control_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            match handle.join() {
                Ok(()) => info!("Control loop stopped"),
                Err(_) => error!("Control loop panicked"),
            }
        }
    }
}

fn control_loop<B: ServoBus>(shared: Arc<Shared<B>>) {
    let mut state = shared.lock();
    loop {
        if state.shutdown {
            break;
        }

        match state.next_tick {
            None => {
                state = shared.wake.wait(state).unwrap_or_else(PoisonError::into_inner);
            }
            Some(deadline) => {
                let now = Instant::now();
                if now < deadline {
                    let (guard, _) = shared
                        .wake
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    state = guard;
                    continue;
                }

                state.robot.tick();

                // Skip missed deadlines instead of replaying them in a burst.
                let next = deadline + shared.interval;
                state.next_tick = Some(if next > now {
                    next
                } else {
                    debug!("Gait tick overran by {:?}", now - deadline);
                    now + shared.interval
                });
            }
        }
    }
}

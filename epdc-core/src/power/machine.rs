//! Power state machine
//!
//! The controller is powered up on the first submission and powered down
//! once every queue has been idle for the configured delay. A pending
//! power-down is identified by a generation number so a late timer can
//! never cut power after a newer submission.

use crate::config::PowerDownDelay;
use crate::traits::PowerControl;
use crate::Error;

/// Controller power states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    /// Regulators and clocks disabled
    Off,
    /// Power-up sequence running
    PoweringUp,
    /// Powered and accepting updates
    On,
    /// Idle, waiting for the debounce delay before cutting power
    PoweringDown { generation: u32 },
}

/// Events that drive the power state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerEvent {
    /// Update submitted
    Submit,
    /// Power-up sequence finished
    PoweredUp,
    /// Regulator or clock sequencing failed
    Fault,
    /// Every queue drained
    Idle { generation: u32 },
    /// Power was cut for the given debounce generation
    PoweredDown { generation: u32 },
    /// Power-down policy changed to never
    KeepOn,
}

impl PowerState {
    /// Whether the controller may be accessed
    pub fn is_powered(&self) -> bool {
        !matches!(self, PowerState::Off)
    }

    /// Process an event and return the next state
    pub fn transition(self, event: PowerEvent) -> Self {
        use PowerEvent::*;
        use PowerState::*;

        match (self, event) {
            (Off, Submit) => PoweringUp,
            (PoweringUp, PoweredUp) => On,
            (PoweringUp, Fault) => Off,

            (On, Idle { generation }) => PoweringDown { generation },

            // A submission during the debounce window cancels the power-down
            (PoweringDown { .. }, Submit) => On,
            (PoweringDown { .. }, KeepOn) => On,
            (PoweringDown { .. }, Fault) => On,
            (PoweringDown { generation }, PoweredDown { generation: done }) if generation == done => {
                Off
            }

            (state, _) => state,
        }
    }
}

/// Request to cut power once `delay_ms` has elapsed without activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerDownTicket {
    pub generation: u32,
    pub delay_ms: u32,
}

/// Power state plus the sequencing policy
#[derive(Debug, Clone, Copy)]
pub struct PowerMachine {
    state: PowerState,
    policy: PowerDownDelay,
    generation: u32,
    power_ups: u32,
    power_downs: u32,
}

impl PowerMachine {
    pub fn new(policy: PowerDownDelay) -> Self {
        Self {
            state: PowerState::Off,
            policy,
            generation: 0,
            power_ups: 0,
            power_downs: 0,
        }
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn policy(&self) -> PowerDownDelay {
        self.policy
    }

    pub fn power_ups(&self) -> u32 {
        self.power_ups
    }

    pub fn power_downs(&self) -> u32 {
        self.power_downs
    }

    /// Change the power-down delay
    ///
    /// Switching to `Never` cancels a pending power-down.
    pub fn set_policy(&mut self, policy: PowerDownDelay) {
        self.policy = policy;
        if policy == PowerDownDelay::Never {
            self.state = self.state.transition(PowerEvent::KeepOn);
        }
    }

    /// Make sure the controller is powered before an update is queued
    ///
    /// Cancels a pending power-down. On failure the state returns to `Off`
    /// and nothing else is touched.
    pub fn ensure_on<P: PowerControl>(&mut self, power: &mut P) -> Result<(), Error> {
        match self.state {
            PowerState::Off => {
                self.state = self.state.transition(PowerEvent::Submit);
                match power.power_up() {
                    Ok(()) => {
                        self.power_ups += 1;
                        self.state = self.state.transition(PowerEvent::PoweredUp);
                        info!("controller powered up");
                        Ok(())
                    }
                    Err(_e) => {
                        error!("controller power-up failed");
                        self.state = self.state.transition(PowerEvent::Fault);
                        Err(Error::HardwareFault)
                    }
                }
            }
            PowerState::PoweringDown { .. } => {
                debug!("power-down cancelled");
                self.state = self.state.transition(PowerEvent::Submit);
                Ok(())
            }
            PowerState::PoweringUp | PowerState::On => Ok(()),
        }
    }

    /// Start the debounce after every queue drained
    ///
    /// Returns the ticket to hand to the power-down timer, or `None` if the
    /// controller is not on or power-down is disabled.
    pub fn queue_idle(&mut self) -> Option<PowerDownTicket> {
        if self.state != PowerState::On {
            return None;
        }
        let delay_ms = self.policy.millis()?;

        self.generation = self.generation.wrapping_add(1);
        self.state = self.state.transition(PowerEvent::Idle {
            generation: self.generation,
        });
        Some(PowerDownTicket {
            generation: self.generation,
            delay_ms,
        })
    }

    /// Whether `ticket` still refers to the current debounce window
    pub fn is_current(&self, ticket: &PowerDownTicket) -> bool {
        self.state
            == PowerState::PoweringDown {
                generation: ticket.generation,
            }
    }

    /// Debounce elapsed; cut power if nothing happened in the meantime
    ///
    /// Returns `Ok(true)` if power was cut and `Ok(false)` for a stale ticket.
    pub fn expire<P: PowerControl>(
        &mut self,
        ticket: PowerDownTicket,
        power: &mut P,
    ) -> Result<bool, Error> {
        if !self.is_current(&ticket) {
            return Ok(false);
        }

        match power.power_down() {
            Ok(()) => {
                self.power_downs += 1;
                self.state = self.state.transition(PowerEvent::PoweredDown {
                    generation: ticket.generation,
                });
                info!("controller powered down");
                Ok(true)
            }
            Err(_e) => {
                error!("controller power-down failed");
                self.state = self.state.transition(PowerEvent::Fault);
                Err(Error::HardwareFault)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPower;

    #[test]
    fn test_transitions() {
        use PowerEvent::*;
        use PowerState::*;

        assert_eq!(Off.transition(Submit), PoweringUp);
        assert_eq!(PoweringUp.transition(PoweredUp), On);
        assert_eq!(PoweringUp.transition(Fault), Off);
        assert_eq!(On.transition(Idle { generation: 3 }), PoweringDown { generation: 3 });
        assert_eq!(PoweringDown { generation: 3 }.transition(Submit), On);
        assert_eq!(
            PoweringDown { generation: 3 }.transition(PoweredDown { generation: 3 }),
            Off
        );
        // Stale completion is ignored
        assert_eq!(
            PoweringDown { generation: 4 }.transition(PoweredDown { generation: 3 }),
            PoweringDown { generation: 4 }
        );
        assert_eq!(On.transition(Submit), On);
        assert_eq!(Off.transition(Idle { generation: 1 }), Off);
    }

    #[test]
    fn test_debounce_expiry_powers_down_once() {
        let mut power = MockPower::new();
        let mut pm = PowerMachine::new(PowerDownDelay::After(500));

        pm.ensure_on(&mut power).unwrap();
        assert_eq!(pm.state(), PowerState::On);
        assert_eq!(power.power_ups, 1);

        let ticket = pm.queue_idle().unwrap();
        assert_eq!(ticket.delay_ms, 500);
        // Already debouncing; no second ticket
        assert!(pm.queue_idle().is_none());

        assert_eq!(pm.expire(ticket, &mut power), Ok(true));
        assert_eq!(pm.expire(ticket, &mut power), Ok(false));
        assert_eq!(pm.state(), PowerState::Off);
        assert_eq!(power.power_downs, 1);
        assert_eq!(pm.power_downs(), 1);
    }

    #[test]
    fn test_submission_cancels_power_down() {
        let mut power = MockPower::new();
        let mut pm = PowerMachine::new(PowerDownDelay::After(500));

        pm.ensure_on(&mut power).unwrap();
        let stale = pm.queue_idle().unwrap();
        pm.ensure_on(&mut power).unwrap();
        assert_eq!(pm.state(), PowerState::On);

        assert_eq!(pm.expire(stale, &mut power), Ok(false));
        assert_eq!(power.power_downs, 0);
        // No extra power-up for a cancelled power-down
        assert_eq!(power.power_ups, 1);

        // The next idle period gets a fresh ticket
        let ticket = pm.queue_idle().unwrap();
        assert_ne!(ticket.generation, stale.generation);
        assert_eq!(pm.expire(ticket, &mut power), Ok(true));
        assert_eq!(power.power_downs, 1);
    }

    #[test]
    fn test_power_up_failure() {
        let mut power = MockPower::new();
        power.fail_power_up = true;
        let mut pm = PowerMachine::new(PowerDownDelay::Immediate);

        assert_eq!(pm.ensure_on(&mut power), Err(Error::HardwareFault));
        assert_eq!(pm.state(), PowerState::Off);
        assert_eq!(pm.power_ups(), 0);

        power.fail_power_up = false;
        assert_eq!(pm.ensure_on(&mut power), Ok(()));
        assert_eq!(pm.state(), PowerState::On);
    }

    #[test]
    fn test_power_down_failure_stays_on() {
        let mut power = MockPower::new();
        let mut pm = PowerMachine::new(PowerDownDelay::Immediate);
        pm.ensure_on(&mut power).unwrap();

        power.fail_power_down = true;
        let ticket = pm.queue_idle().unwrap();
        assert_eq!(ticket.delay_ms, 0);
        assert_eq!(pm.expire(ticket, &mut power), Err(Error::HardwareFault));
        assert_eq!(pm.state(), PowerState::On);
    }

    #[test]
    fn test_never_policy() {
        let mut power = MockPower::new();
        let mut pm = PowerMachine::new(PowerDownDelay::After(100));
        pm.ensure_on(&mut power).unwrap();
        let ticket = pm.queue_idle().unwrap();

        pm.set_policy(PowerDownDelay::Never);
        assert_eq!(pm.state(), PowerState::On);
        assert!(pm.queue_idle().is_none());
        assert_eq!(pm.expire(ticket, &mut power), Ok(false));
    }
}

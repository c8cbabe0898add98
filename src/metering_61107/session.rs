use super::{
    reply_parser,
    structs::{Command, MeterIdentification, SessionReport, SessionState},
    transport::{Connector, Transport, TransportError, READ_BUFFER_SIZE},
    utils, SessionError,
};
use crate::config::MeterConfig;
use crate::exporter::GaugeSink;
use crate::models::Device;
use log::{debug, info, warn};
use std::time::Duration;

/// Something that can wait. The meter needs settling time between frames.
pub trait Clock {
    fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Minimum pauses the meter needs to answer correctly
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    /// Before the line is opened
    pub settle: Duration,
    /// Between writing a frame and reading the answer, also the read window
    pub turnaround: Duration,
}

impl From<&MeterConfig> for FrameTiming {
    fn from(config: &MeterConfig) -> Self {
        FrameTiming {
            settle: Duration::from_millis(config.settle_delay),
            turnaround: Duration::from_millis(config.sleep_interval),
        }
    }
}

/// One conversation with one meter. The line is closed when the session is closed
/// or dropped, whichever comes first.
pub struct Session<'a, L: Transport, C: Clock + ?Sized> {
    device: &'a Device,
    line: Option<L>,
    clock: &'a C,
    timing: &'a FrameTiming,
    state: SessionState,
}

impl<'a, L: Transport, C: Clock + ?Sized> Session<'a, L, C> {
    pub fn new(device: &'a Device, line: L, clock: &'a C, timing: &'a FrameTiming) -> Self {
        Session {
            device,
            line: Some(line),
            clock,
            timing,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Device {}: {:?} -> {:?}", self.device.display_name(), self.state, next);
        self.state = next;
    }

    fn pause(&self) {
        self.clock.sleep(self.timing.turnaround);
    }

    fn io_failed(&self, step: &'static str, source: TransportError) -> SessionError {
        SessionError::IoFailed {
            device: self.device.address.clone(),
            step,
            source,
        }
    }

    fn send(&mut self, frame: &[u8], step: &'static str) -> Result<(), SessionError> {
        let result = match self.line.as_mut() {
            Some(line) => line.write(frame).map(|_| ()),
            None => Err(TransportError::Io(std::io::ErrorKind::NotConnected.into())),
        };
        result.map_err(|e| self.io_failed(step, e))
    }

    fn receive(&mut self, step: &'static str) -> Result<Vec<u8>, SessionError> {
        let result = match self.line.as_mut() {
            Some(line) => line.read_up_to(READ_BUFFER_SIZE),
            None => Err(TransportError::Io(std::io::ErrorKind::NotConnected.into())),
        };
        result.map_err(|e| self.io_failed(step, e))
    }

    pub fn sign_on(&mut self) -> Result<MeterIdentification, SessionError> {
        self.transition(SessionState::SignOn);
        self.send(&utils::sign_on_frame(&self.device.address), "sign-on")?;
        self.pause();

        let reply = self.receive("sign-on")?;
        let identification = utils::parse_identification(&reply)
            .map_err(|source| SessionError::Identification {
                device: self.device.address.clone(),
                source,
            })?;

        debug!("Device {} identified as {}{}", self.device.display_name(),
               identification.manufacturer, identification.identification);
        Ok(identification)
    }

    /// Selects programming mode with the mode byte the meter announced
    pub fn acknowledge(&mut self, identification: &MeterIdentification) -> Result<(), SessionError> {
        self.pause();
        self.send(&utils::acknowledge_frame(identification.mode), "acknowledge")?;
        self.pause();

        let reply = self.receive("acknowledge")?;
        match utils::decode_command_frame(&reply) {
            Ok((header, body)) => debug!("Device {} entered programming mode: {} {}",
                                         self.device.display_name(), header, body),
            Err(e) => debug!("Device {} programming mode reply not understood: {}",
                             self.device.display_name(), e),
        }

        self.transition(SessionState::Acknowledged);
        Ok(())
    }

    /// Issues one read command and hands what could be decoded to the sink.
    /// Returns the number of emitted and skipped measurements.
    pub fn read_command<S: GaugeSink + ?Sized>(&mut self, command: Command, sink: &S) -> Result<(usize, usize), SessionError> {
        let frame = utils::encode_command_frame(utils::READ_HEADER, &command.body());
        self.send(&frame, command.name())?;
        self.pause();

        let reply = self.receive(command.name())?;
        if reply.is_empty() {
            warn!("No reply to {} from device {} within {:?}",
                  command.name(), self.device.display_name(), self.timing.turnaround);
            return Ok((0, command.field_count()));
        }

        if utils::verify_reply_check(&reply) == Some(false) {
            warn!("Block check of the {} reply from device {} does not match",
                  command.name(), self.device.display_name());
        }

        let fields = utils::split_reply(&reply);
        let measurements = reply_parser::decode(command, &self.device.address, &fields);
        for measurement in measurements.iter() {
            sink.set_gauge(measurement.metric, &measurement.labels, measurement.value);
        }

        Ok((measurements.len(), command.field_count() - measurements.len()))
    }

    pub fn command_loop<S: GaugeSink + ?Sized>(&mut self, sink: &S, report: &mut SessionReport) -> Result<(), SessionError> {
        self.transition(SessionState::CommandLoop);
        for command in Command::ALL {
            let (emitted, skipped) = self.read_command(command, sink)?;
            report.measurements += emitted;
            report.skipped += skipped;
        }
        Ok(())
    }

    pub fn exchange<S: GaugeSink + ?Sized>(&mut self, sink: &S, report: &mut SessionReport) -> Result<(), SessionError> {
        let identification = self.sign_on()?;
        self.acknowledge(&identification)?;
        self.command_loop(sink, report)
    }

    /// Sends the break frame. Also attempted after a failure, its own failure is only logged.
    pub fn sign_off(&mut self) {
        self.transition(SessionState::SignOff);
        if let Err(e) = self.send(&utils::break_frame(), "sign-off") {
            warn!("{}", e);
        }
    }

    pub fn close(&mut self) {
        if let Some(mut line) = self.line.take() {
            line.close();
            self.transition(SessionState::Closed);
        }
    }
}

impl<'a, L: Transport, C: Clock + ?Sized> Drop for Session<'a, L, C> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Runs a complete session against one device: sign-on, acknowledgement, all read
/// commands and sign-off. The line is closed on every path once it was opened.
pub fn run_session<K, C, S>(
    connector: &K,
    port: &str,
    device: &Device,
    timing: &FrameTiming,
    clock: &C,
    sink: &S,
) -> Result<SessionReport, SessionError>
where
    K: Connector + ?Sized,
    C: Clock + ?Sized,
    S: GaugeSink + ?Sized,
{
    clock.sleep(timing.settle);
    let line = connector.open(port, timing.turnaround)
        .map_err(|source| SessionError::OpenFailed {
            device: device.address.clone(),
            source,
        })?;

    let mut report = SessionReport {
        device: device.address.clone(),
        ..Default::default()
    };

    let mut session = Session::new(device, line, clock, timing);
    let outcome = session.exchange(sink, &mut report);
    session.sign_off();
    session.close();

    outcome?;
    info!("Device {} read: {} values, {} skipped", device.display_name(), report.measurements, report.skipped);
    Ok(report)
}

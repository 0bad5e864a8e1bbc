//! Mock adapter driver for testing
//!
//! Links opened by one [`MockDriver`] share its scripted state, so a test
//! can keep the driver handle and inspect what the links were asked.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hud_core::AdapterValue;
use parking_lot::{Mutex, RwLock};

use super::{AdapterDriver, AdapterError, AdapterLink, AdapterResponse, ConnectParams};

#[derive(Default)]
struct MockState {
    responses: RwLock<HashMap<String, AdapterResponse>>,
    failing: RwLock<HashSet<String>>,
    /// Unknown commands answer with their own name
    echo: AtomicBool,
    latency: RwLock<Duration>,

    /// Connect calls that fail before one succeeds
    connect_failures: AtomicU32,
    connect_calls: AtomicU32,
    report_disconnected: AtomicBool,
    /// Protocol reported right after connect
    protocol: RwLock<Option<String>>,
    /// Whether `set_protocol` is accepted
    accept_protocol: AtomicBool,
    set_protocol_calls: Mutex<Vec<String>>,

    requests: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    open_links: AtomicUsize,
    close_calls: AtomicUsize,
    fail_close: AtomicBool,
}

/// Mock adapter driver
#[derive(Clone)]
pub struct MockDriver {
    state: Arc<MockState>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// A driver whose links negotiate protocol "6" and answer a small
    /// default vehicle
    pub fn new() -> Self {
        let driver = Self {
            state: Arc::new(MockState::default()),
        };
        *driver.state.protocol.write() = Some("6".to_string());
        driver.state.accept_protocol.store(true, Ordering::SeqCst);
        for (command, response) in Self::default_responses() {
            driver.add_response(command, response);
        }
        driver
    }

    fn default_responses() -> Vec<(&'static str, AdapterResponse)> {
        vec![
            ("RPM", AdapterResponse::quantity(850.0, "revolutions_per_minute")),
            ("SPEED", AdapterResponse::quantity(0.0, "kilometer_per_hour")),
            ("COOLANT_TEMP", AdapterResponse::quantity(90.0, "degree_Celsius")),
            ("THROTTLE_POS", AdapterResponse::quantity(14.9, "percent")),
            ("ENGINE_LOAD", AdapterResponse::quantity(21.6, "percent")),
            ("FUEL_LEVEL", AdapterResponse::quantity(63.5, "percent")),
            ("INTAKE_TEMP", AdapterResponse::quantity(25.0, "degree_Celsius")),
            ("MAF", AdapterResponse::quantity(3.52, "gps")),
            (
                "STATUS",
                AdapterResponse::new(
                    AdapterValue::List(vec![
                        AdapterValue::Bool(false),
                        AdapterValue::Number(0.0),
                        AdapterValue::from("spark"),
                    ]),
                    None,
                ),
            ),
        ]
    }

    /// Script the response to a command
    pub fn add_response(&self, command: &str, response: AdapterResponse) {
        self.state
            .responses
            .write()
            .insert(command.to_string(), response);
    }

    /// Make a command's query return an error
    pub fn fail_command(&self, command: &str) {
        self.state.failing.write().insert(command.to_string());
    }

    /// Answer unscripted commands with `Text(command)`
    pub fn set_echo(&self, echo: bool) {
        self.state.echo.store(echo, Ordering::SeqCst);
    }

    /// Blocking delay applied to every query
    pub fn set_latency(&self, latency: Duration) {
        *self.state.latency.write() = latency;
    }

    /// Fail the next `count` connect calls
    pub fn fail_connects(&self, count: u32) {
        self.state.connect_failures.store(count, Ordering::SeqCst);
    }

    /// Links open but report `is_connected() == false`
    pub fn set_report_disconnected(&self, disconnected: bool) {
        self.state
            .report_disconnected
            .store(disconnected, Ordering::SeqCst);
    }

    /// Protocol reported after connect (`None` = not negotiated)
    pub fn set_protocol(&self, protocol: Option<&str>) {
        *self.state.protocol.write() = protocol.map(str::to_string);
    }

    pub fn set_accept_protocol(&self, accept: bool) {
        self.state.accept_protocol.store(accept, Ordering::SeqCst);
    }

    pub fn set_fail_close(&self, fail: bool) {
        self.state.fail_close.store(fail, Ordering::SeqCst);
    }

    pub fn connect_calls(&self) -> u32 {
        self.state.connect_calls.load(Ordering::SeqCst)
    }

    pub fn set_protocol_calls(&self) -> Vec<String> {
        self.state.set_protocol_calls.lock().clone()
    }

    /// Every command queried so far, in issue order
    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().clone()
    }

    pub fn request_count(&self, command: &str) -> usize {
        self.state
            .requests
            .lock()
            .iter()
            .filter(|c| c.as_str() == command)
            .count()
    }

    /// Highest number of queries ever outstanding at once
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    /// Links opened and not yet closed
    pub fn open_links(&self) -> usize {
        self.state.open_links.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.state.close_calls.load(Ordering::SeqCst)
    }

    /// Open a link directly, bypassing the failure script
    pub fn open_link(&self) -> MockLink {
        self.state.open_links.fetch_add(1, Ordering::SeqCst);
        MockLink {
            state: self.state.clone(),
            protocol: self.state.protocol.read().clone(),
            open: true,
        }
    }
}

impl AdapterDriver for MockDriver {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn AdapterLink>, AdapterError> {
        self.state.connect_calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.state.connect_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.state
                .connect_failures
                .store(remaining - 1, Ordering::SeqCst);
            return Err(AdapterError::ConnectionFailed(format!(
                "mock refused {}",
                params.connection_string
            )));
        }

        tracing::debug!(connection = %params.connection_string, "Mock driver: link opened");
        Ok(Box::new(self.open_link()))
    }
}

/// Link opened by [`MockDriver`]
pub struct MockLink {
    state: Arc<MockState>,
    protocol: Option<String>,
    open: bool,
}

impl MockLink {
    fn respond(&self, command: &str) -> Result<AdapterResponse, AdapterError> {
        if self.state.failing.read().contains(command) {
            return Err(AdapterError::Query(format!("mock failure for {}", command)));
        }
        if let Some(response) = self.state.responses.read().get(command) {
            return Ok(response.clone());
        }
        if self.state.echo.load(Ordering::SeqCst) {
            return Ok(AdapterResponse::new(command, None));
        }
        Ok(AdapterResponse::null())
    }
}

impl AdapterLink for MockLink {
    fn is_connected(&self) -> bool {
        self.open && !self.state.report_disconnected.load(Ordering::SeqCst)
    }

    fn status(&self) -> String {
        if self.is_connected() {
            "Car Connected".to_string()
        } else {
            "Not Connected".to_string()
        }
    }

    fn protocol_id(&self) -> Option<String> {
        self.protocol.clone()
    }

    fn protocol_name(&self) -> Option<String> {
        self.protocol.as_ref().map(|id| format!("Mock protocol {}", id))
    }

    fn set_protocol(&mut self, id: &str) -> bool {
        self.state.set_protocol_calls.lock().push(id.to_string());
        if self.state.accept_protocol.load(Ordering::SeqCst) {
            self.protocol = Some(id.to_string());
            true
        } else {
            false
        }
    }

    fn query(&mut self, command: &str) -> Result<AdapterResponse, AdapterError> {
        if !self.open {
            return Err(AdapterError::ConnectionClosed);
        }

        let in_flight = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        self.state.requests.lock().push(command.to_string());

        let latency = *self.state.latency.read();
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }

        let response = self.respond(command);
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }

    fn close(&mut self) -> Result<(), AdapterError> {
        self.state.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.open {
            self.open = false;
            self.state.open_links.fetch_sub(1, Ordering::SeqCst);
        }
        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(AdapterError::ConnectionFailed("mock close failure".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdapterConfig;

    #[test]
    fn test_scripted_and_default_responses() {
        let driver = MockDriver::new();
        driver.add_response("VIN", AdapterResponse::new("1G1ZT53826F109149", None));
        let mut link = driver.connect(&AdapterConfig::default().connect_params()).unwrap();

        assert!(link.is_connected());
        assert_eq!(link.protocol_id().as_deref(), Some("6"));
        assert_eq!(
            link.query("VIN").unwrap().value,
            AdapterValue::Text("1G1ZT53826F109149".into())
        );
        assert!(link.query("RPM").unwrap().value.as_f64().is_some());
        assert!(link.query("FUEL_RATE").unwrap().is_null());
        assert_eq!(driver.requests(), vec!["VIN", "RPM", "FUEL_RATE"]);
    }

    #[test]
    fn test_failure_injection() {
        let driver = MockDriver::new();
        driver.fail_command("RPM");
        driver.fail_connects(1);
        let params = AdapterConfig::default().connect_params();

        assert!(driver.connect(&params).is_err());
        let mut link = driver.connect(&params).unwrap();
        assert!(matches!(link.query("RPM"), Err(AdapterError::Query(_))));
        assert_eq!(driver.connect_calls(), 2);
    }

    #[test]
    fn test_echo_mode() {
        let driver = MockDriver::new();
        driver.set_echo(true);
        let mut link = driver.open_link();
        assert_eq!(
            link.query("A_17").unwrap().value,
            AdapterValue::Text("A_17".into())
        );
    }

    #[test]
    fn test_close_tracks_open_links() {
        let driver = MockDriver::new();
        let mut link = driver.open_link();
        assert_eq!(driver.open_links(), 1);

        link.close().unwrap();
        link.close().unwrap();
        assert_eq!(driver.open_links(), 0);
        assert_eq!(driver.close_calls(), 2);
        assert!(matches!(link.query("RPM"), Err(AdapterError::ConnectionClosed)));
    }

    #[test]
    fn test_protocol_selection() {
        let driver = MockDriver::new();
        driver.set_protocol(None);
        let mut link = driver.open_link();
        assert_eq!(link.protocol_id(), None);

        assert!(link.set_protocol("6"));
        assert_eq!(link.protocol_id().as_deref(), Some("6"));
        assert_eq!(driver.set_protocol_calls(), vec!["6"]);
    }
}

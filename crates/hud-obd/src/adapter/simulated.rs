//! Simulated vehicle driver
//!
//! Answers every standard command with plausible values that follow a
//! repeating 60 s drive cycle (idle, accelerate, cruise, coast) and a
//! warm-up curve for temperatures, with a little sensor noise.

use std::f64::consts::PI;
use std::time::Instant;

use hud_core::AdapterValue;
use rand::Rng;

use super::{AdapterDriver, AdapterError, AdapterLink, AdapterResponse, ConnectParams};

/// VIN reported by the simulated vehicle
pub const SIMULATED_VIN: &str = "1G1ZT53826F109149";

const DRIVE_CYCLE_SECS: f64 = 60.0;
const PROTOCOL_ID: &str = "6";
const PROTOCOL_NAME: &str = "ISO 15765-4 (CAN 11/500)";

/// Driver producing [`SimulatedLink`]s
#[derive(Debug, Default)]
pub struct SimulatedDriver;

impl SimulatedDriver {
    pub fn new() -> Self {
        Self
    }
}

impl AdapterDriver for SimulatedDriver {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn AdapterLink>, AdapterError> {
        tracing::info!(
            connection = %params.connection_string,
            "Simulated adapter: link opened"
        );
        Ok(Box::new(SimulatedLink::new()))
    }
}

/// Link to the simulated vehicle
pub struct SimulatedLink {
    started: Instant,
    open: bool,
    protocol: Option<String>,
}

impl Default for SimulatedLink {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedLink {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            open: true,
            protocol: Some(PROTOCOL_ID.to_string()),
        }
    }

    fn elapsed(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

/// Vehicle state at `t` seconds after the link opened
struct Vehicle {
    t: f64,
    speed_kmh: f64,
    rpm: f64,
    throttle: f64,
    load: f64,
    warm: f64,
}

impl Vehicle {
    fn at(t: f64) -> Self {
        let phase = (t % DRIVE_CYCLE_SECS) / DRIVE_CYCLE_SECS;
        let (speed_kmh, throttle) = if phase < 0.15 {
            (0.0, 0.0)
        } else if phase < 0.4 {
            let p = (phase - 0.15) / 0.25;
            (95.0 * p, 35.0 + 30.0 * (p * PI).sin())
        } else if phase < 0.8 {
            (95.0 + 5.0 * (t / 3.0).sin(), 22.0)
        } else {
            let p = (phase - 0.8) / 0.2;
            (95.0 * (1.0 - p), 0.0)
        };
        let rpm = if speed_kmh < 1.0 {
            800.0
        } else {
            900.0 + speed_kmh * 21.0 + throttle * 10.0
        };
        let warm = 1.0 - (-t / 180.0).exp();

        Self {
            t,
            speed_kmh,
            rpm,
            throttle,
            load: 18.0 + throttle * 0.9,
            warm,
        }
    }

    fn coolant(&self) -> f64 {
        20.0 + 70.0 * self.warm
    }

    fn manifold(&self) -> f64 {
        30.0 + self.throttle * 1.6
    }
}

fn noise(amplitude: f64) -> f64 {
    rand::thread_rng().gen_range(-amplitude..=amplitude)
}

fn reading(command: &str, v: &Vehicle) -> AdapterResponse {
    use AdapterResponse as R;
    match command {
        "RPM" => R::quantity(v.rpm + noise(15.0), "revolutions_per_minute"),
        "SPEED" => R::quantity(v.speed_kmh, "kilometer_per_hour"),
        "COOLANT_TEMP" => R::quantity(v.coolant().round(), "degree_Celsius"),
        "THROTTLE_POS" => R::quantity(14.9 + v.throttle, "percent"),
        "FUEL_LEVEL" => R::quantity(63.5 - v.t / 600.0, "percent"),
        "ENGINE_LOAD" => R::quantity(v.load + noise(1.0), "percent"),
        "INTAKE_TEMP" => R::quantity(25.0 + 10.0 * v.warm, "degree_Celsius"),
        "MAF" => R::quantity(v.rpm * v.load / 4000.0, "gps"),
        "FUEL_PRESSURE" => R::quantity(345.0, "kilopascal"),
        "FUEL_RAIL_PRESSURE_ABS" => R::quantity(5200.0 + v.throttle * 40.0, "kilopascal"),
        "FUEL_RAIL_PRESSURE_DIRECT" => R::quantity(5100.0 + v.throttle * 40.0, "kilopascal"),
        "FUEL_INJECTION_TIMING" => R::quantity(-2.5 + v.throttle / 20.0, "degree"),
        "FUEL_RATE" => R::quantity(0.8 + v.load * v.rpm / 20000.0, "liters_per_hour"),
        "SHORT_FUEL_TRIM_1" | "SHORT_FUEL_TRIM_2" => R::quantity(noise(3.0), "percent"),
        "LONG_FUEL_TRIM_1" => R::quantity(1.6, "percent"),
        "LONG_FUEL_TRIM_2" => R::quantity(-0.8, "percent"),
        "FUEL_TYPE" => R::new("Gasoline", None),
        "ETHANOL_PERCENT" => R::quantity(10.0, "percent"),
        "EVAP_VAPOR_PRESSURE" => R::quantity(-120.0 + noise(5.0), "pascal"),
        "EVAP_VAPOR_PRESSURE_ABS" => R::quantity(101.2, "kilopascal"),
        "O2_S1_WR_VOLTAGE" | "O2_S2_WR_VOLTAGE" => {
            R::quantity(0.45 + 0.4 * (v.t * 2.0).sin(), "volt")
        }
        "CATALYST_TEMP_B1S1" => R::quantity(20.0 + 500.0 * v.warm, "degree_Celsius"),
        "CATALYST_TEMP_B2S1" => R::quantity(15.0 + 480.0 * v.warm, "degree_Celsius"),
        "EGR_ERROR" => R::quantity(noise(2.0), "percent"),
        "COMMANDED_EGR" => R::quantity(v.throttle / 5.0, "percent"),
        "AMBIANT_AIR_TEMP" => R::quantity(21.0, "degree_Celsius"),
        "OIL_TEMP" => R::quantity(20.0 + 75.0 * v.warm, "degree_Celsius"),
        "FUEL_TEMP" => R::quantity(21.0 + 8.0 * v.warm, "degree_Celsius"),
        "TIMING_ADVANCE" => R::quantity(8.0 + v.rpm / 400.0, "degree"),
        "ABSOLUTE_THROTTLE_POS" => R::quantity(15.3 + v.throttle, "percent"),
        "RELATIVE_THROTTLE_POS" => R::quantity(v.throttle, "percent"),
        "ACCELERATOR_POS_D" => R::quantity(v.throttle * 0.8, "percent"),
        "COMMANDED_THROTTLE_ACTUATOR" => R::quantity(v.throttle * 0.9, "percent"),
        "INTAKE_PRESSURE" => R::quantity(v.manifold(), "kilopascal"),
        "BAROMETRIC_PRESSURE" => R::quantity(101.0, "kilopascal"),
        "ABSOLUTE_LOAD" => R::quantity(v.load * 1.1, "percent"),
        "RELATIVE_LOAD" => R::quantity(v.load * 0.9, "percent"),
        "DISTANCE_W_MIL" => R::quantity(42.0, "kilometer"),
        "DISTANCE_SINCE_DTC_CLEAR" => R::quantity(1287.0, "kilometer"),
        "RUN_TIME" => R::quantity(v.t.floor(), "second"),
        "TIME_SINCE_DTC_CLEARED" => R::quantity(3120.0, "minute"),
        "CONTROL_MODULE_VOLTAGE" => R::quantity(14.1 + noise(0.1), "volt"),
        "ENGINE_FRICTION_PERCENT" => R::quantity(12.0, "percent"),
        "DRIVER_DEMAND_ENGINE_TORQUE" => R::quantity(v.throttle * 1.2, "percent"),
        "ACTUAL_ENGINE_TORQUE" => R::quantity(v.throttle * 1.1, "percent"),
        "ENGINE_REFERENCE_TORQUE" => R::quantity(350.0, "newton_meter"),
        "CHARGE_AIR_TEMP" => R::quantity(30.0 + 15.0 * v.warm, "degree_Celsius"),
        "VIN" => R::new(SIMULATED_VIN, None),
        "ECU_NAME" => R::new("ECM-EngineControl", None),
        "FUEL_STATUS" => R::new("Closed loop, using oxygen sensor feedback", None),
        "OBD_COMPLIANCE" => R::new("OBD-II as defined by the CARB", None),
        "STATUS" => R::new(
            AdapterValue::List(vec![
                AdapterValue::Bool(true),
                AdapterValue::Number(2.0),
                AdapterValue::from("spark"),
            ]),
            None,
        ),
        "GET_DTC" => R::new(
            AdapterValue::List(vec![
                AdapterValue::List(vec![
                    "P0301".into(),
                    "Cylinder 1 Misfire Detected".into(),
                ]),
                AdapterValue::List(vec![
                    "P0420".into(),
                    "Catalyst System Efficiency Below Threshold (Bank 1)".into(),
                ]),
            ]),
            None,
        ),
        // Not fitted to this vehicle
        _ => R::null(),
    }
}

impl AdapterLink for SimulatedLink {
    fn is_connected(&self) -> bool {
        self.open
    }

    fn status(&self) -> String {
        if self.open {
            "Car Connected".to_string()
        } else {
            "Not Connected".to_string()
        }
    }

    fn protocol_id(&self) -> Option<String> {
        self.protocol.clone()
    }

    fn protocol_name(&self) -> Option<String> {
        self.protocol.as_ref().map(|_| PROTOCOL_NAME.to_string())
    }

    fn set_protocol(&mut self, id: &str) -> bool {
        if id == PROTOCOL_ID {
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
        Ok(reading(command, &Vehicle::at(self.elapsed())))
    }

    fn close(&mut self) -> Result<(), AdapterError> {
        self.open = false;
        Ok(())
    }
}

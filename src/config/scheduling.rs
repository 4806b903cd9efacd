//! Configuración de franjas horarias y ciclo de vida de reservas
//!
//! Ventana operativa, umbrales de demanda, zona horaria y TTL de holds,
//! con overrides opcionales por zona de servicio.

use anyhow::{anyhow, Result};
use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone,
    Timelike, Utc,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::environment::{non_empty_var, parse_var};

/// Override de ventana/zona horaria para una zona de servicio
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAreaOverride {
    pub operating_hours: Option<(u32, u32)>,
    pub timezone: Option<String>,
    pub utc_offset_minutes: Option<i32>,
}

/// Configuración del motor de disponibilidad
#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    pub operating_hours: (u32, u32),
    pub medium_threshold: usize,
    pub high_threshold: usize,
    pub timezone: String,
    pub utc_offset_minutes: i32,
    pub hold_ttl: std::time::Duration,
    pub service_areas: HashMap<String, ServiceAreaOverride>,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            operating_hours: (8, 20),
            medium_threshold: 3,
            high_threshold: 5,
            timezone: "America/Toronto".to_string(),
            utc_offset_minutes: -300,
            hold_ttl: std::time::Duration::from_secs(15 * 60),
            service_areas: HashMap::new(),
        }
    }
}

/// Ventana efectiva tras resolver la zona de servicio
#[derive(Debug, Clone)]
pub struct EffectiveWindow {
    pub start_hour: u32,
    pub end_hour: u32,
    pub timezone: String,
    pub offset: FixedOffset,
}

impl SchedulingConfig {
    /// Cargar desde variables de entorno (SERVICE_AREAS_FILE es un JSON opcional)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let service_areas = match non_empty_var("SERVICE_AREAS_FILE") {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)
                    .map_err(|e| anyhow!("Cannot read SERVICE_AREAS_FILE '{}': {}", path, e))?;
                serde_json::from_str(&raw)
                    .map_err(|e| anyhow!("Invalid SERVICE_AREAS_FILE '{}': {}", path, e))?
            }
            None => HashMap::new(),
        };

        let config = Self {
            operating_hours: (
                parse_var("SLOT_START_HOUR", defaults.operating_hours.0)?,
                parse_var("SLOT_END_HOUR", defaults.operating_hours.1)?,
            ),
            medium_threshold: parse_var("DEMAND_MEDIUM_THRESHOLD", defaults.medium_threshold)?,
            high_threshold: parse_var("DEMAND_HIGH_THRESHOLD", defaults.high_threshold)?,
            timezone: non_empty_var("SLOT_TIMEZONE").unwrap_or(defaults.timezone),
            utc_offset_minutes: parse_var("SLOT_UTC_OFFSET_MINUTES", defaults.utc_offset_minutes)?,
            hold_ttl: std::time::Duration::from_secs(parse_var(
                "SLOT_HOLD_TTL_SECS",
                defaults.hold_ttl.as_secs(),
            )?),
            service_areas,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validar coherencia de ventanas, umbrales y offsets
    pub fn validate(&self) -> Result<()> {
        validate_window(self.operating_hours)?;
        validate_offset(self.utc_offset_minutes)?;

        if self.medium_threshold == 0 {
            return Err(anyhow!("medium demand threshold must be at least 1"));
        }
        if self.medium_threshold > self.high_threshold {
            return Err(anyhow!(
                "medium demand threshold ({}) cannot exceed high threshold ({})",
                self.medium_threshold,
                self.high_threshold
            ));
        }
        if self.hold_ttl.as_secs() == 0 {
            return Err(anyhow!("slot hold TTL must be positive"));
        }

        for (area, area_override) in &self.service_areas {
            if let Some(window) = area_override.operating_hours {
                validate_window(window).map_err(|e| anyhow!("service area '{}': {}", area, e))?;
            }
            if let Some(offset) = area_override.utc_offset_minutes {
                validate_offset(offset).map_err(|e| anyhow!("service area '{}': {}", area, e))?;
            }
        }
        Ok(())
    }

    /// Resolver la ventana efectiva; zona desconocida o ausente usa los defaults
    pub fn resolve(&self, service_area: Option<&str>) -> EffectiveWindow {
        let area_override = service_area.and_then(|area| self.service_areas.get(area));

        let (start_hour, end_hour) = area_override
            .and_then(|o| o.operating_hours)
            .unwrap_or(self.operating_hours);
        let timezone = area_override
            .and_then(|o| o.timezone.clone())
            .unwrap_or_else(|| self.timezone.clone());
        let offset_minutes = area_override
            .and_then(|o| o.utc_offset_minutes)
            .unwrap_or(self.utc_offset_minutes);

        EffectiveWindow {
            start_hour,
            end_hour,
            timezone,
            offset: FixedOffset::east_opt(offset_minutes * 60).unwrap_or_else(|| Utc.fix()),
        }
    }
}

impl EffectiveWindow {
    /// Horas de la ventana, en orden ascendente
    pub fn hours(&self) -> impl Iterator<Item = u32> {
        self.start_hour..=self.end_hour
    }

    pub fn contains_hour(&self, hour: u32) -> bool {
        hour >= self.start_hour && hour <= self.end_hour
    }

    /// Instante UTC de la medianoche local de `date`
    pub fn local_midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        let naive = NaiveDateTime::new(date, NaiveTime::MIN);
        Utc.from_utc_datetime(&naive) - Duration::seconds(i64::from(self.offset.local_minus_utc()))
    }

    /// Límites [inicio, fin) del día local en UTC
    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.local_midnight(date);
        (start, start + Duration::days(1))
    }

    /// Inicio UTC de la hora local `hour` del día `date`
    pub fn slot_instant(&self, date: NaiveDate, hour: u32) -> DateTime<Utc> {
        self.local_midnight(date) + Duration::hours(i64::from(hour))
    }

    /// Hora de reloj local de un instante
    pub fn local_hour(&self, at: DateTime<Utc>) -> u32 {
        at.with_timezone(&self.offset).hour()
    }

    /// Truncar un instante al inicio de su hora de reloj local
    pub fn slot_start(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let local = at.with_timezone(&self.offset);
        let truncated = local
            - Duration::minutes(i64::from(local.minute()))
            - Duration::seconds(i64::from(local.second()))
            - Duration::nanoseconds(i64::from(local.nanosecond()));
        truncated.with_timezone(&Utc)
    }
}

fn validate_window((start, end): (u32, u32)) -> Result<()> {
    if start > end || end > 23 {
        return Err(anyhow!(
            "operating hours must satisfy start <= end <= 23 (got {}-{})",
            start,
            end
        ));
    }
    Ok(())
}

fn validate_offset(minutes: i32) -> Result<()> {
    if minutes.abs() >= 24 * 60 {
        return Err(anyhow!("UTC offset out of range: {} minutes", minutes));
    }
    Ok(())
}

/// Política de transiciones ambiguas del ciclo de vida
#[derive(Debug, Clone, Copy)]
pub struct BookingPolicy {
    /// confirm() solo desde PENDING
    pub confirm_requires_pending: bool,
    /// cancelar una reserva ya cancelada es un no-op
    pub allow_recancel: bool,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            confirm_requires_pending: true,
            allow_recancel: true,
        }
    }
}

impl BookingPolicy {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            confirm_requires_pending: parse_var(
                "CONFIRM_REQUIRES_PENDING",
                defaults.confirm_requires_pending,
            )?,
            allow_recancel: parse_var("ALLOW_RECANCEL", defaults.allow_recancel)?,
        })
    }
}

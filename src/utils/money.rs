//! Formato de montos, distancias y duraciones para presentación

use rust_decimal::{Decimal, RoundingStrategy};

/// Redondeo de presentación a 2 decimales (mitad hacia arriba)
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// "$12.34"
pub fn format_currency(amount: Decimal) -> String {
    format!("${:.2}", round_currency(amount))
}

/// Distancia legible: "850m" o "8.5km"
pub fn format_distance(meters: u64) -> String {
    if meters < 1000 {
        return format!("{}m", meters);
    }
    let km = Decimal::from(meters) / Decimal::from(1000);
    format!("{:.1}km", km.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero))
}

/// Duración legible: "1h 5min" o "42min"
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours > 0 {
        format!("{}h {}min", hours, minutes)
    } else {
        format!("{}min", minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_currency_half_up() {
        assert_eq!(round_currency(Decimal::new(1567475, 4)), Decimal::new(15675, 2));
        assert_eq!(round_currency(Decimal::new(19125, 3)), Decimal::new(1913, 2));
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(Decimal::new(50, 0)), "$50.00");
        assert_eq!(format_currency(Decimal::new(88725, 4)), "$8.87");
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(850), "850m");
        assert_eq!(format_distance(8500), "8.5km");
        assert_eq!(format_distance(12_345), "12.3km");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(2520), "42min");
        assert_eq!(format_duration(3900), "1h 5min");
    }
}

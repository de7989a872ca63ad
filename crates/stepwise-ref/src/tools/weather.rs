//! Offline weather lookup.
//!
//! All data here is hardcoded and fictional. No external service is
//! contacted; the table stands in for a live weather API.

use tracing::debug;

use stepwise_core::traits::Tool;

/// Capability a session must hold to look up weather.
pub const WEATHER_READ: &str = "weather:read";

const CONDITIONS: &[(&str, &str)] = &[
    ("paris", "Sunny +20°C"),
    ("new york", "Partly cloudy +12°C"),
    ("london", "Overcast +14°C"),
    ("tokyo", "Light rain +17°C"),
    ("delhi", "Haze +31°C"),
    ("sydney", "Clear +23°C"),
];

/// Current conditions for `city`, matched case-insensitively.
pub fn lookup_conditions(city: &str) -> Option<&'static str> {
    let key = city.trim().to_lowercase();
    CONDITIONS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, conditions)| *conditions)
}

/// `get_weather`: takes a city name and reports its current weather.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeatherTool;

impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Takes a city name as an input and returns the current weather for the city"
    }

    fn required_capabilities(&self) -> Vec<String> {
        vec![WEATHER_READ.to_string()]
    }

    fn invoke(&self, input: &str) -> String {
        let city = input.trim();
        debug!(city = %city, "weather lookup");
        match lookup_conditions(city) {
            Some(conditions) => format!("The weather in {} is {}.", city, conditions),
            None => format!("Something went wrong: no weather data for '{}'", city),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_city_reports_conditions() {
        assert_eq!(WeatherTool.invoke("paris"), "The weather in paris is Sunny +20°C.");
    }

    #[test]
    fn lookup_ignores_case_and_padding() {
        assert_eq!(lookup_conditions("  New York "), Some("Partly cloudy +12°C"));
    }

    #[test]
    fn unknown_city_is_reported_in_the_output() {
        let output = WeatherTool.invoke("atlantis");
        assert!(output.starts_with("Something went wrong"), "got: {output}");
        assert!(output.contains("atlantis"));
    }

    #[test]
    fn declares_weather_capability() {
        assert_eq!(WeatherTool.required_capabilities(), vec!["weather:read"]);
    }
}

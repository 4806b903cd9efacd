use anyhow::{anyhow, Result};
use colored::*;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::io::{self, Write};

#[tokio::main]
async fn main() -> Result<()> {
    println!("{}", "🚚 Delivery Booking Testing Tool".bright_blue().bold());
    println!("{}", "=====================================".bright_blue());
    println!();

    let base_url = prompt("URL del servidor [http://localhost:3000]: ")?;
    let base_url = if base_url.is_empty() {
        "http://localhost:3000".to_string()
    } else {
        base_url.trim_end_matches('/').to_string()
    };
    let client = Client::new();

    loop {
        println!();
        println!("{}", "📋 MENÚ PRINCIPAL".bright_green().bold());
        println!("{}", "==================".bright_green());
        println!("1. 🚗 Listar tipos de vehículo");
        println!("2. 🧾 Calcular cotización de prueba");
        println!("3. 📅 Ver franjas disponibles");
        println!("4. 📦 Cotizar y reservar");
        println!("5. 🏁 Carrera: N reservas a la misma franja");
        println!("6. 🚪 Salir");
        let choice = prompt("Selecciona una opción (1-6): ")?;

        let result = match choice.as_str() {
            "1" => list_vehicles(&client, &base_url).await,
            "2" => calculate_estimate(&client, &base_url).await.map(|_| ()),
            "3" => show_slots(&client, &base_url).await,
            "4" => estimate_and_book(&client, &base_url).await,
            "5" => race_same_slot(&client, &base_url).await,
            "6" => {
                println!("{}", "👋 ¡Hasta luego!".bright_green());
                break;
            }
            _ => {
                println!("{}", "❌ Opción inválida. Intenta de nuevo.".bright_red());
                Ok(())
            }
        };

        if let Err(e) = result {
            println!("{} {}", "❌ Error:".bright_red(), e);
        }
    }

    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label.bright_yellow());
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn print_response(status: StatusCode, body: &Value) -> Result<()> {
    let label = format!("📥 HTTP {}", status);
    if status.is_success() {
        println!("{}", label.bright_green());
    } else {
        println!("{}", label.bright_red());
    }
    println!("{}", serde_json::to_string_pretty(body)?);
    Ok(())
}

async fn list_vehicles(client: &Client, base_url: &str) -> Result<()> {
    let response = client.get(format!("{}/estimate/vehicles", base_url)).send().await?;
    let status = response.status();
    let body: Value = response.json().await?;
    print_response(status, &body)
}

async fn calculate_estimate(client: &Client, base_url: &str) -> Result<Value> {
    let vehicle_type = prompt("Tipo de vehículo [van]: ")?;
    let vehicle_type = if vehicle_type.is_empty() { "van".to_string() } else { vehicle_type };

    let payload = json!({
        "pickup": {
            "address": "100 Queen St W, Toronto",
            "coordinates": { "lat": 43.6532, "lng": -79.3832 }
        },
        "destination": {
            "address": "1 Yonge St, Toronto",
            "coordinates": { "lat": 43.6426, "lng": -79.3871 }
        },
        "vehicleType": vehicle_type,
        "estimatedDuration": 45
    });

    println!("{}", "📦 Payload:".bright_blue());
    println!("{}", serde_json::to_string_pretty(&payload)?);

    let response = client
        .post(format!("{}/estimate/calculate", base_url))
        .json(&payload)
        .send()
        .await?;
    let status = response.status();
    let body: Value = response.json().await?;
    print_response(status, &body)?;

    if !status.is_success() {
        return Err(anyhow!("la cotización falló"));
    }
    Ok(body)
}

async fn show_slots(client: &Client, base_url: &str) -> Result<()> {
    let date = prompt("Fecha (YYYY-MM-DD): ")?;
    let vehicle_type = prompt("Tipo de vehículo (opcional): ")?;

    let response = client
        .get(format!("{}/bookings/availability/slots", base_url))
        .query(&[("date", date.as_str()), ("vehicleType", vehicle_type.as_str())])
        .send()
        .await?;
    let status = response.status();
    let body: Value = response.json().await?;
    if !status.is_success() {
        return print_response(status, &body);
    }

    println!("{} {}", "🕗 Zona horaria:".bright_blue(), body["data"]["timezone"]);
    for slot in body["data"]["slots"].as_array().cloned().unwrap_or_default() {
        let line = format!(
            "{:>2}:00  {}  demanda={}  x{}",
            slot["hour"], slot["time"], slot["demandLevel"], slot["surgeMultiplier"]
        );
        if slot["available"] == true {
            println!("✅ {}", line.bright_green());
        } else {
            println!("⛔ {}", line.bright_red());
        }
    }
    Ok(())
}

fn booking_payload(estimate_id: &str, scheduled_at: &str, customer: usize) -> Value {
    json!({
        "estimateId": estimate_id,
        "customerName": format!("Test Customer {}", customer),
        "customerEmail": format!("customer{}@example.com", customer),
        "customerPhone": "4165550100",
        "scheduledAt": scheduled_at,
    })
}

async fn estimate_and_book(client: &Client, base_url: &str) -> Result<()> {
    let estimate = calculate_estimate(client, base_url).await?;
    let estimate_id = estimate["data"]["id"]
        .as_str()
        .ok_or_else(|| anyhow!("respuesta sin id de cotización"))?
        .to_string();
    let scheduled_at = prompt("Fecha/hora RFC 3339 (ej: 2030-06-03T19:00:00Z): ")?;

    let response = client
        .post(format!("{}/bookings", base_url))
        .json(&booking_payload(&estimate_id, &scheduled_at, 1))
        .send()
        .await?;
    let status = response.status();
    let body: Value = response.json().await?;
    print_response(status, &body)
}

/// Dispara N reservas simultáneas sobre la misma franja: solo una debe ganar
async fn race_same_slot(client: &Client, base_url: &str) -> Result<()> {
    let attempts: usize = prompt("Número de intentos [10]: ")?.parse().unwrap_or(10);
    let scheduled_at = prompt("Fecha/hora RFC 3339 (ej: 2030-06-03T19:00:00Z): ")?;

    let mut estimate_ids = Vec::with_capacity(attempts);
    for _ in 0..attempts {
        let response = client
            .post(format!("{}/estimate/calculate", base_url))
            .json(&json!({
                "pickup": { "address": "A", "coordinates": { "lat": 43.6532, "lng": -79.3832 } },
                "destination": { "address": "B", "coordinates": { "lat": 43.6426, "lng": -79.3871 } },
                "vehicleType": "van"
            }))
            .send()
            .await?;
        let body: Value = response.json().await?;
        let id = body["data"]["id"]
            .as_str()
            .ok_or_else(|| anyhow!("cotización sin id: {}", body))?;
        estimate_ids.push(id.to_string());
    }

    let handles: Vec<_> = estimate_ids
        .into_iter()
        .enumerate()
        .map(|(i, estimate_id)| {
            let client = client.clone();
            let url = format!("{}/bookings", base_url);
            let payload = booking_payload(&estimate_id, &scheduled_at, i);
            tokio::spawn(async move {
                client
                    .post(url)
                    .json(&payload)
                    .send()
                    .await
                    .map(|r| r.status())
            })
        })
        .collect();

    let (mut created, mut conflicts, mut others) = (0, 0, 0);
    for handle in handles {
        match handle.await? {
            Ok(StatusCode::CREATED) => created += 1,
            Ok(StatusCode::CONFLICT) => conflicts += 1,
            Ok(status) => {
                println!("{} {}", "⚠️ Estado inesperado:".bright_yellow(), status);
                others += 1;
            }
            Err(e) => {
                println!("{} {}", "⚠️ Error de red:".bright_yellow(), e);
                others += 1;
            }
        }
    }

    println!("📊 creadas={} conflictos={} otros={}", created, conflicts, others);
    if created <= 1 {
        println!("{}", "✅ Sin doble reserva".bright_green().bold());
    } else {
        println!("{}", "❌ DOBLE RESERVA DETECTADA".bright_red().bold());
    }
    Ok(())
}

use anyhow::Result;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use delivery_booking::config::{BookingPolicy, EnvironmentConfig, SchedulingConfig};
use delivery_booking::services::{HereRouteOracle, PricingEngine};
use delivery_booking::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("delivery_booking=debug,tower_http=info")),
        )
        .init();

    info!("🚚 Delivery Booking - Cotizaciones y reservas");
    info!("================================================");

    let config = EnvironmentConfig::from_env()?;
    let scheduling = SchedulingConfig::from_env()?;
    scheduling.validate()?;
    let policy = BookingPolicy::from_env()?;

    let pricing = PricingEngine::from_name(&config.pricing_strategy).map_err(|e| {
        error!("❌ Estrategia de precio inválida: {}", e);
        anyhow::anyhow!(e.to_string())
    })?;
    let oracle = HereRouteOracle::from_config(&config).map_err(|e| {
        error!("❌ Proveedor de rutas sin configurar: {}", e);
        anyhow::anyhow!(e.to_string())
    })?;

    info!(
        "🕗 Ventana operativa {}-{}h ({}), umbrales {}/{}",
        scheduling.operating_hours.0,
        scheduling.operating_hours.1,
        scheduling.timezone,
        scheduling.medium_threshold,
        scheduling.high_threshold
    );

    let addr: SocketAddr = config.server_addr().parse()?;
    let app_state = AppState::connect(config, Arc::new(oracle), pricing, scheduling, policy).await?;
    let app = create_router(app_state);

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET  /health - Health check");
    info!("🧾 Cotizaciones:");
    info!("   POST /estimate/calculate - Calcular cotización");
    info!("   GET  /estimate/vehicles - Listar tipos de vehículo");
    info!("   POST /estimate/geocode/route - Ruta entre coordenadas");
    info!("   GET  /estimate/:id - Obtener cotización");
    info!("   POST /estimate/:id/save - Guardar cotización");
    info!("   GET  /estimate/user/:userId - Cotizaciones de un usuario");
    info!("📅 Reservas:");
    info!("   GET  /bookings/availability/slots - Franjas disponibles");
    info!("   GET  /bookings/availability/busy-times - Horas ocupadas");
    info!("   POST /bookings/slots/reserve - Retener franja");
    info!("   DELETE /bookings/slots/reserve - Liberar franja");
    info!("   POST /bookings - Crear reserva");
    info!("   GET|PUT|DELETE /bookings/:id - Obtener, actualizar o cancelar");
    info!("   POST /bookings/:id/confirm|start|complete|rating");
    info!("   GET  /bookings/:id/status - Estado de la reserva");
    info!("   GET  /bookings/user/:userId/history - Historial");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!("❌ Error del servidor: {}", e);
            e
        })?;

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo instalar el handler de Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el handler de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}

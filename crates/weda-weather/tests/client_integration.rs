//! Integration tests for WeatherClient and IpLocator using wiremock.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use weda_weather::{
    IpLocator, LocationError, PositionOptions, PositionProvider, Query, WeatherClient,
    WeatherCondition, WeatherError,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn weather_json(name: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "weather": [{ "main": "Clouds", "description": "broken clouds" }],
        "main": { "temp": 14.0, "temp_min": 12.0, "temp_max": 16.0, "humidity": 70, "pressure": 1015 },
        "wind": { "speed": 3.6 },
        "sys": { "sunrise": 1700000000, "sunset": 1700035000 }
    })
}

fn client_for(server: &MockServer) -> WeatherClient {
    WeatherClient::new(&server.uri(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_current_weather_by_city() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/weather"))
        .and(query_param("city", "New York"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_json("New York")))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = client_for(&server)
        .current_weather(&Query::city("New York"))
        .await
        .unwrap();

    assert_eq!(snapshot.name, "New York");
    assert_eq!(
        snapshot.primary_condition().unwrap().category(),
        WeatherCondition::Clouds
    );
    assert_eq!(snapshot.main.temp_max, 16.0);
}

#[tokio::test]
async fn test_current_weather_by_coords() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/weather/coords"))
        .and(query_param("lat", "48.85"))
        .and(query_param("lon", "2.35"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_json("Paris")))
        .expect(1)
        .mount(&server)
        .await;

    let query = Query::Coords {
        latitude: 48.85,
        longitude: 2.35,
    };
    let snapshot = client_for(&server).current_weather(&query).await.unwrap();
    assert_eq!(snapshot.name, "Paris");
}

#[tokio::test]
async fn test_current_weather_non_success_is_city_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/weather"))
        .respond_with(ResponseTemplate::new(404).set_body_string("City not found: Atlantis"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .current_weather(&Query::city("Atlantis"))
        .await
        .unwrap_err();

    assert!(matches!(err, WeatherError::CityNotFound(ref city) if city == "Atlantis"));
    assert_eq!(err.user_message(), "City not found");
}

#[tokio::test]
async fn test_server_error_on_primary_is_also_city_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/weather"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .current_weather(&Query::city("Berlin"))
        .await
        .unwrap_err();
    assert!(matches!(err, WeatherError::CityNotFound(_)));
}

#[tokio::test]
async fn test_forecast_failure_reports_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/weather/forecast"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .forecast(&Query::city("Berlin"))
        .await
        .unwrap_err();

    match err {
        WeatherError::Api { endpoint, status } => {
            assert_eq!(endpoint, "/api/weather/forecast");
            assert_eq!(status, 503);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_air_quality_by_city() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/air-quality"))
        .and(query_param("city", "Delhi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "aqi": 180 })))
        .mount(&server)
        .await;

    let reading = client_for(&server)
        .air_quality(&Query::city("Delhi"))
        .await
        .unwrap();
    assert_eq!(reading.aqi, 180);
    assert_eq!(reading.level().label(), "Unhealthy");
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/air-quality"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .air_quality(&Query::city("Delhi"))
        .await
        .unwrap_err();
    assert!(matches!(err, WeatherError::Parse(_)));
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let client = WeatherClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
    let err = client
        .current_weather(&Query::city("Oslo"))
        .await
        .unwrap_err();
    assert!(matches!(err, WeatherError::Network(_)));
}

#[tokio::test]
async fn test_ip_locator_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "success",
            "city": "Toronto",
            "lat": 43.65,
            "lon": -79.38
        })))
        .mount(&server)
        .await;

    let locator = IpLocator::new(&format!("{}/json", server.uri())).unwrap();
    let position = locator
        .current_position(&PositionOptions::default())
        .await
        .unwrap();

    assert_eq!(position.latitude, 43.65);
    assert_eq!(position.longitude, -79.38);
}

#[tokio::test]
async fn test_ip_locator_fail_status_is_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "fail",
            "message": "private range"
        })))
        .mount(&server)
        .await;

    let locator = IpLocator::new(&server.uri()).unwrap();
    let err = locator
        .current_position(&PositionOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, LocationError::PositionUnavailable);
}

#[tokio::test]
async fn test_ip_locator_http_error_is_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let locator = IpLocator::new(&server.uri()).unwrap();
    let err = locator
        .current_position(&PositionOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, LocationError::PositionUnavailable);
}

#[tokio::test]
async fn test_ip_locator_slow_response_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "lat": 1.0, "lon": 2.0 }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let options = PositionOptions {
        timeout: Duration::from_millis(100),
        ..PositionOptions::default()
    };
    let locator = IpLocator::new(&server.uri()).unwrap();
    let err = locator.current_position(&options).await.unwrap_err();
    assert_eq!(err, LocationError::Timeout);
}

#[tokio::test]
async fn test_ip_locator_stalled_body_times_out() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // Headers arrive at once, then the body never completes
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = socket.read(&mut buf).await;
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 100\r\n\r\n{\"lat\":",
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(socket);
    });

    let options = PositionOptions {
        timeout: Duration::from_millis(300),
        ..PositionOptions::default()
    };
    let locator = IpLocator::new(&format!("http://{}", addr)).unwrap();
    let err = locator.current_position(&options).await.unwrap_err();
    assert_eq!(err, LocationError::Timeout);
}

#[tokio::test]
async fn test_ip_locator_garbage_body_is_unknown() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let locator = IpLocator::new(&server.uri()).unwrap();
    let err = locator
        .current_position(&PositionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, LocationError::Unknown(_)));
}

//! Request payloads submitted by the creation cases

use serde::Serialize;

use crate::config::AdminCredentials;

#[derive(Debug, Clone, Serialize)]
pub struct FirstAdminUser {
    pub email: String,
    pub username: String,
    pub password: String,
    pub role: String,
    pub badge_number: String,
    pub department: String,
    pub phone: String,
    pub service_number: String,
    pub rank: String,
}

impl FirstAdminUser {
    pub fn new(credentials: &AdminCredentials) -> Self {
        Self {
            email: credentials.email.clone(),
            username: "Administrator".to_string(),
            password: credentials.password.clone(),
            role: "admin".to_string(),
            badge_number: "ADMIN001".to_string(),
            department: "Administration".to_string(),
            phone: "+49-2336-123456".to_string(),
            service_number: "SVC001".to_string(),
            rank: "Hauptkommissar".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(credentials: &AdminCredentials) -> Self {
        Self {
            email: credentials.email.clone(),
            password: credentials.password.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewIncident {
    pub title: String,
    pub description: String,
    pub priority: String,
    pub location: LatLng,
    pub address: String,
    pub images: Vec<String>,
}

impl Default for NewIncident {
    fn default() -> Self {
        Self {
            title: "Test Incident - Verkehrsunfall".to_string(),
            description: "Schwerer Verkehrsunfall auf der B7 mit mehreren Fahrzeugen beteiligt. \
                          Rettungsdienst und Feuerwehr sind bereits vor Ort."
                .to_string(),
            priority: "high".to_string(),
            location: LatLng {
                lat: 51.2879,
                lng: 7.2954,
            },
            address: "Hauptstraße 123, 58332 Schwelm".to_string(),
            images: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPerson {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub age: u32,
    pub birth_date: String,
    pub status: String,
    pub description: String,
    pub last_seen_location: String,
    pub last_seen_date: String,
    pub contact_info: String,
    pub case_number: String,
    pub priority: String,
}

impl Default for NewPerson {
    fn default() -> Self {
        Self {
            first_name: "Max".to_string(),
            last_name: "Mustermann".to_string(),
            address: "Musterstraße 42, 58332 Schwelm".to_string(),
            age: 35,
            birth_date: "1988-05-15".to_string(),
            status: "vermisst".to_string(),
            description: "Etwa 1,80m groß, braune Haare, trägt eine blaue Jacke. \
                          Zuletzt gesehen am Bahnhof Schwelm."
                .to_string(),
            last_seen_location: "Bahnhof Schwelm".to_string(),
            last_seen_date: "2024-01-15".to_string(),
            contact_info: "Ehefrau: Maria Mustermann, Tel: 02336-123456".to_string(),
            case_number: "VM-2024-001".to_string(),
            priority: "high".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub content: String,
    pub channel: String,
    pub message_type: String,
}

impl NewMessage {
    pub fn for_channel(channel: &str) -> Self {
        Self {
            content: "Test-Nachricht: Alle Einheiten, bitte Status melden. \
                      Dies ist ein automatisierter Test der Kommunikationssysteme."
                .to_string(),
            channel: channel.to_string(),
            message_type: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewReport {
    pub title: String,
    pub content: String,
    pub shift_date: String,
}

impl Default for NewReport {
    fn default() -> Self {
        Self {
            title: "Schichtbericht - Tagesdienst".to_string(),
            content: "Schichtbericht für den 15.01.2024:\n\n\
                      - 3 Verkehrskontrollen durchgeführt\n\
                      - 1 Verkehrsunfall aufgenommen (siehe Vorfall VM-2024-001)\n\
                      - Streifenfahrt durch Innenstadt ohne besondere Vorkommnisse\n\
                      - Bürgersprechstunde von 14:00-16:00 Uhr\n\n\
                      Besondere Vorkommnisse: Keine\n\
                      Empfehlungen: Verstärkte Kontrollen im Bereich Bahnhof"
                .to_string(),
            shift_date: "2024-01-15".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmergencyAlert {
    #[serde(rename = "type")]
    pub alert_type: String,
    pub message: String,
    pub location: GpsFix,
    pub location_status: String,
    pub priority: String,
}

impl Default for EmergencyAlert {
    fn default() -> Self {
        Self {
            alert_type: "sos_alarm".to_string(),
            message: "NOTFALL-TEST: Beamter benötigt sofortige Unterstützung! \
                      Dies ist ein automatisierter Test des Notrufsystems."
                .to_string(),
            location: GpsFix {
                latitude: 51.2879,
                longitude: 7.2954,
                accuracy: 10,
            },
            location_status: "GPS verfügbar".to_string(),
            priority: "urgent".to_string(),
        }
    }
}

/// Everything the creation cases submit, built once per run
#[derive(Debug, Clone)]
pub struct Fixtures {
    pub admin: FirstAdminUser,
    pub login: LoginRequest,
    pub incident: NewIncident,
    pub person: NewPerson,
    pub message: NewMessage,
    pub report: NewReport,
    pub alert: EmergencyAlert,
    /// Channel queried when listing messages
    pub channel: String,
}

impl Fixtures {
    pub fn new(credentials: &AdminCredentials, channel: &str) -> Self {
        Self {
            admin: FirstAdminUser::new(credentials),
            login: LoginRequest::new(credentials),
            incident: NewIncident::default(),
            person: NewPerson::default(),
            message: NewMessage::for_channel(channel),
            report: NewReport::default(),
            alert: EmergencyAlert::default(),
            channel: channel.to_string(),
        }
    }
}

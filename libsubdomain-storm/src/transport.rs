use crate::resolver::{DnsError, DnsRecord, DnsTransport, RecordKind};
use async_trait::async_trait;
use futures::StreamExt;
use hickory_client::{
    client::{Client, ClientHandle},
    ClientError, ClientErrorKind,
    proto::{
        op::ResponseCode,
        rr::{DNSClass, Name, RData, Record, RecordType},
        runtime::TokioRuntimeProvider,
        tcp::TcpClientStream,
        udp::UdpClientStream,
        xfer::DnsResponse,
        ProtoError, ProtoErrorKind,
    },
};
use std::{net::SocketAddr, time::Duration};

/// Talks to arbitrary servers with hickory: UDP for lookups, TCP for AXFR.
#[derive(Debug, Clone, Copy, Default)]
pub struct HickoryTransport;

impl HickoryTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DnsTransport for HickoryTransport {
    async fn query(
        &self,
        server: SocketAddr,
        name: &str,
        kind: RecordKind,
        timeout: Duration,
    ) -> Result<Vec<DnsRecord>, DnsError> {
        let name = absolute_name(name)?;
        let rtype = record_type(kind);

        let result = tokio::time::timeout(timeout, async {
            let conn = UdpClientStream::builder(server, TokioRuntimeProvider::default())
                .with_timeout(Some(timeout))
                .build();
            let (mut client, bg) = Client::connect(conn)
                .await
                .map_err(|e| map_client_error(e.into()))?;
            tokio::spawn(bg);
            let response = client
                .query(name, DNSClass::IN, rtype)
                .await
                .map_err(|e| map_client_error(e.into()))?;
            answers(&response)
        })
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(_) => Err(DnsError::Timeout),
        }
    }

    async fn zone_transfer(
        &self,
        server: SocketAddr,
        zone: &str,
        timeout: Duration,
    ) -> Result<Vec<DnsRecord>, DnsError> {
        let zone = absolute_name(zone)?;

        let result = tokio::time::timeout(timeout, async {
            let (stream, sender) =
                TcpClientStream::new(server, None, Some(timeout), TokioRuntimeProvider::default());
            let (mut client, bg) = Client::new(stream, sender, None)
                .await
                .map_err(|e| map_client_error(e.into()))?;
            tokio::spawn(bg);

            let mut records = Vec::new();
            let mut xfr = Box::pin(client.zone_transfer(zone, None));
            while let Some(response) = xfr.next().await {
                let response = response.map_err(|e| map_client_error(e.into()))?;
                check_code(response.response_code())?;
                records.extend(response.answers().iter().map(to_record));
            }
            Ok::<_, DnsError>(records)
        })
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(_) => Err(DnsError::Timeout),
        }
    }
}

fn absolute_name(name: &str) -> Result<Name, DnsError> {
    let fqdn = if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    };
    Name::from_ascii(&fqdn).map_err(|e| DnsError::Transport(format!("invalid name {}: {}", name, e)))
}

fn record_type(kind: RecordKind) -> RecordType {
    match kind {
        RecordKind::A => RecordType::A,
        RecordKind::Ns => RecordType::NS,
        RecordKind::Mx => RecordType::MX,
        RecordKind::Txt => RecordType::TXT,
        RecordKind::Soa => RecordType::SOA,
        RecordKind::Other => RecordType::ANY,
    }
}

fn record_kind(rtype: RecordType) -> RecordKind {
    match rtype {
        RecordType::A => RecordKind::A,
        RecordType::NS => RecordKind::Ns,
        RecordType::MX => RecordKind::Mx,
        RecordType::TXT => RecordKind::Txt,
        RecordType::SOA => RecordKind::Soa,
        _ => RecordKind::Other,
    }
}

fn to_record(record: &Record) -> DnsRecord {
    let data = match record.data() {
        RData::MX(mx) => mx.exchange().to_ascii(),
        RData::NS(ns) => ns.0.to_ascii(),
        RData::A(a) => a.0.to_string(),
        other => other.to_string(),
    };
    DnsRecord::new(record.name().to_ascii(), record_kind(record.record_type()), data)
}

fn answers(response: &DnsResponse) -> Result<Vec<DnsRecord>, DnsError> {
    check_code(response.response_code())?;
    Ok(response.answers().iter().map(to_record).collect())
}

fn check_code(code: ResponseCode) -> Result<(), DnsError> {
    match code {
        ResponseCode::NoError => Ok(()),
        ResponseCode::NXDomain => Err(DnsError::NxDomain),
        ResponseCode::Refused | ResponseCode::NotAuth | ResponseCode::NotImp => Err(DnsError::Refused),
        other => Err(DnsError::Transport(format!("server answered {}", other))),
    }
}

fn map_client_error(e: ClientError) -> DnsError {
    match e.kind() {
        ClientErrorKind::Timeout => DnsError::Timeout,
        ClientErrorKind::Proto(p) => map_proto_error(p),
        _ => DnsError::Transport(e.to_string()),
    }
}

fn map_proto_error(e: &ProtoError) -> DnsError {
    match e.kind() {
        ProtoErrorKind::Timeout => DnsError::Timeout,
        ProtoErrorKind::NoRecordsFound { response_code, .. } => match check_code(*response_code) {
            Ok(()) => DnsError::NoRecords,
            Err(e) => e,
        },
        _ => DnsError::Transport(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{normalize_candidate, Domain};
    use hickory_client::proto::rr::rdata::MX;

    #[test]
    fn names_are_made_absolute() {
        assert_eq!(absolute_name("example.com").unwrap().to_utf8(), "example.com.");
        assert_eq!(absolute_name("example.com.").unwrap().to_utf8(), "example.com.");
    }

    #[test]
    fn punycode_names_stay_ascii() {
        let exchange = Name::from_ascii("xn--mnchen-3ya.example.com.").unwrap();
        let owner = Name::from_ascii("xn--bcher-kva.example.com.").unwrap();
        let record = Record::from_rdata(owner, 300, RData::MX(MX::new(10, exchange)));

        let converted = to_record(&record);
        assert_eq!(converted.kind, RecordKind::Mx);
        assert_eq!(converted.data, "xn--mnchen-3ya.example.com.");
        assert_eq!(converted.name, "xn--bcher-kva.example.com.");

        let domain = Domain::parse("example.com").unwrap();
        assert_eq!(
            normalize_candidate(&converted.data, &domain).as_deref(),
            Some("xn--mnchen-3ya.example.com")
        );
        assert!(absolute_name(&converted.data).is_ok());
    }

    #[test]
    fn client_errors_keep_their_meaning() {
        assert_eq!(map_client_error(ClientErrorKind::Timeout.into()), DnsError::Timeout);
        assert_eq!(
            map_client_error(ClientError::from(ProtoError::from(ProtoErrorKind::Timeout))),
            DnsError::Timeout
        );
        assert!(matches!(
            map_client_error(ClientErrorKind::Message("connection closed").into()),
            DnsError::Transport(_)
        ));
    }

    #[test]
    fn response_codes_map_to_outcomes() {
        assert_eq!(check_code(ResponseCode::NoError), Ok(()));
        assert_eq!(check_code(ResponseCode::Refused), Err(DnsError::Refused));
        assert_eq!(check_code(ResponseCode::NotAuth), Err(DnsError::Refused));
        assert_eq!(check_code(ResponseCode::NXDomain), Err(DnsError::NxDomain));
        assert!(matches!(check_code(ResponseCode::ServFail), Err(DnsError::Transport(_))));
    }
}

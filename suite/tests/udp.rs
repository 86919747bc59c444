use std::time::Duration;
use futures_concurrency::future::Race;
use tokio::net::UdpSocket;

use ringuart::{
    device::Device,
    host::*,
    protocol::Code,
    };
use ringuart_suite::{serve, serve_late, init_logging};


#[tokio::test]
async fn nmea_over_udp() {
    init_logging();
    let device = Device::<128>::new();
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("failed to bind device socket");
    let address = socket.local_addr().unwrap();

    let test = async {
        let transport = UdpTransport::open(address).await.expect("failed to open transport");
        let mut uart = Uart::connect(transport).await.expect("failed to initialize uart");
        assert_eq!(uart.pool_size(), 128);

        uart.write_line("$PMTK605*31\n").await.unwrap();
        assert_eq!(device.lock().await.received(), b"$PMTK605*31\r\n");

        device.push(b"$PMTK705,AXN_2.10_3339_2012072601,5223,PA6H,1.0*6B\r\n").await;
        assert_eq!(
            uart.read_line(Duration::from_secs(1)).await,
            "$PMTK705,AXN_2.10_3339_2012072601,5223,PA6H,1.0*6B",
            );

        // several pools of output while nobody reads
        for i in 0 .. 20 {
            device.push(format!("$GPGGA,{:06},4807.038,N,01131.000,E*47\r\n", i).as_bytes()).await;
        }
        let line = uart.read_line(Duration::from_secs(1)).await;
        assert!(line.starts_with("$GPGGA,0000"), "resumed in the middle of a line: {:?}", line);
        assert!(line.ends_with("*47"));
    };
    let server = async {
        serve(&device, &socket).await.expect("emulated device failed");
    };
    (test, server).race().await;
}

#[tokio::test]
async fn late_answer_does_not_shift_later_exchanges() {
    init_logging();
    let device = Device::<64>::new();
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("failed to bind device socket");
    let address = socket.local_addr().unwrap();

    let test = async {
        let transport = UdpTransport::open(address).await.expect("failed to open transport")
            .with_timeout(Duration::from_millis(20));
        let mut uart = Uart::connect(transport).await.expect("failed to initialize uart");
        device.push(b"$GPGSV,3,1,11\r\n").await;

        // the first cache answer comes after its request was abandoned
        assert_eq!(uart.read_line(Duration::from_secs(1)).await, "$GPGSV,3,1,11");
        uart.write_line("$PMTK000*32\n").await.unwrap();
        assert_eq!(device.lock().await.received(), b"$PMTK000*32\r\n");

        device.push(b"$PMTK001,0,3*30\r\n").await;
        assert_eq!(uart.read_line(Duration::from_secs(1)).await, "$PMTK001,0,3*30");
    };
    let server = async {
        serve_late(&device, &socket, Code::CacheRequest, Duration::from_millis(60)).await
            .expect("emulated device failed");
    };
    (test, server).race().await;
}

#[tokio::test]
async fn silent_device_fails_handshake() {
    init_logging();
    // bound but never answering
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("failed to bind device socket");
    let transport = UdpTransport::open(socket.local_addr().unwrap()).await
        .expect("failed to open transport")
        .with_timeout(Duration::from_millis(50));
    assert_eq!(transport.timeout(), Duration::from_millis(50));

    let Err(error) = Uart::connect(transport).await
        else {panic!("handshake succeeded without device")};
    match error {
        Error::Connect(cause) => assert!(matches!(*cause, Error::Timeout), "{:?}", cause),
        other => panic!("unexpected error {:?}", other),
    }
}

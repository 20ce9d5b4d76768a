use std::error::Error;

use crate::pipeline::queue::{QueueError, RequestQueue, Status, UpstreamRequest};

#[tokio::test]
async fn test_queue_is_fifo_and_skips_cancelled() -> Result<(), Box<dyn Error>> {
    let mut queue = RequestQueue::new(4);
    assert!(queue.is_empty());
    assert!(!queue.has_waiting());

    let (first, first_rx) = UpstreamRequest::new(vec![0; 8]);
    let (second, mut second_rx) = UpstreamRequest::new(vec![0; 8]);
    let (third, mut third_rx) = UpstreamRequest::new(vec![0; 8]);
    queue.push(first)?;
    queue.push(second)?;
    queue.push(third)?;
    assert_eq!(queue.len(), 3);

    drop(first_rx);
    queue.pop().unwrap().complete_with_report(&[1, 2, 3]);
    queue.pop().unwrap().complete(Status::DeviceDataError, 0);
    assert!(queue.pop().is_none());
    assert!(queue.is_empty());

    let completion = second_rx.recv().await.unwrap();
    assert_eq!(completion.status, Status::Success);
    assert_eq!(completion.report(), Some(&[1, 2, 3][..]));
    let completion = third_rx.recv().await.unwrap();
    assert_eq!(completion.status, Status::DeviceDataError);
    assert_eq!(completion.report(), None);

    Ok(())
}

#[tokio::test]
async fn test_full_queue_prunes_cancelled() -> Result<(), Box<dyn Error>> {
    let mut queue = RequestQueue::new(1);
    let (first, first_rx) = UpstreamRequest::new(vec![0; 8]);
    queue.push(first)?;

    let (second, _second_rx) = UpstreamRequest::new(vec![0; 8]);
    let Err(QueueError::Full(second)) = queue.push(second) else {
        panic!("expected a full queue");
    };

    // A cancelled request frees its place
    drop(first_rx);
    queue.push(second)?;
    assert_eq!(queue.len(), 1);
    assert!(queue.has_waiting());

    Ok(())
}

#[tokio::test]
async fn test_report_larger_than_request_buffer() -> Result<(), Box<dyn Error>> {
    let (request, mut rx) = UpstreamRequest::new(vec![0; 2]);
    request.complete_with_report(&[1, 2, 3]);

    let completion = rx.recv().await.unwrap();
    assert_eq!(completion.status, Status::DeviceDataError);
    assert_eq!(completion.information, 0);
    assert_eq!(completion.buffer, vec![0, 0]);

    Ok(())
}
